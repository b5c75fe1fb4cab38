use super::heads::HeadMap;
use super::{IterKey, KeyTransformer, NestedIterator, transform};
use crate::error::Result;
use log::trace;

/// Move every exclude head below `candidate` up to it, dropping excludes that
/// run dry. Heads are keyed by transformed value.
pub fn catch_up<T: IterKey>(
    candidate: &T,
    heads: &mut HeadMap<T>,
    excludes: &mut [Box<dyn NestedIterator<T>>],
    transformer: Option<KeyTransformer<T>>,
) -> Result<()> {
    for key in heads.keys_below(candidate) {
        for child in heads.remove_all(&key) {
            match excludes[child].move_to(candidate)? {
                Some(value) => heads.insert(transform(transformer, &value), child),
                None => trace!("exclude {} exhausted at {:?}", child, candidate),
            }
        }
    }
    Ok(())
}

/// True when any exclude holds `candidate`
pub fn is_filtered<T: IterKey>(
    candidate: &T,
    heads: &mut HeadMap<T>,
    excludes: &mut [Box<dyn NestedIterator<T>>],
    transformer: Option<KeyTransformer<T>>,
) -> Result<bool> {
    catch_up(candidate, heads, excludes, transformer)?;
    Ok(heads.contains(candidate))
}
