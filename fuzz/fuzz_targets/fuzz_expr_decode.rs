#![no_main]

use libfuzzer_sys::fuzz_target;
use shardjoin::expr::codec;
use shardjoin::utils::encoding::SliceReader;

fuzz_target!(|data: &[u8]| {
    let mut reader = SliceReader::new(data);
    if let Ok(node) = codec::decode(&mut reader) {
        let mut buf = Vec::new();
        codec::encode(&node, &mut buf);
        let again = codec::decode(&mut SliceReader::new(&buf)).expect("re-encoded fragment decodes");
        assert_eq!(again.text(), node.text());
    }
});
