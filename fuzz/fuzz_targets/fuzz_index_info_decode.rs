#![no_main]

use libfuzzer_sys::fuzz_target;
use shardjoin::index::IndexInfo;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must survive another round trip
    if let Ok(info) = IndexInfo::from_bytes(data) {
        let bytes = info.to_bytes();
        let again = IndexInfo::from_bytes(&bytes).expect("re-encoded info decodes");
        assert_eq!(again, info);
    }
});
