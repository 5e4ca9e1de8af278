pub fn de(input: &[u8]) {
    let parser = tapeson::Parser::new();
    let ours = parser.parse_ndjson(input);

    if let Ok(doc) = &ours {
        // Every document we accept had better also round-trip through the
        // codec without changing what it marshals to.
        let bytes = tapeson::codec::serialize(doc, tapeson::CompressMode::Default);
        let back = tapeson::codec::deserialize(&bytes).expect("serialized document must deserialize");
        assert_eq!(doc.marshal_json(), back.marshal_json());
    }

    // Single-line inputs should agree with serde_json on whether they're
    // valid JSON at all (NDJSON with blank/multiple lines has no serde_json
    // equivalent, so we only cross-check the single-value case).
    if !input.contains(&b'\n') {
        let serde_ok = serde_json::from_slice::<serde_json::Value>(input).is_ok();
        let ours_ok = tapeson::Parser::new().parse(input).is_ok();
        if serde_ok {
            assert!(ours_ok, "serde_json accepted input we rejected: {:?}", input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs, io::Read};

    #[test]
    fn inputs() {
        if let Ok(inputs) = fs::read_dir("../in") {
            for input in inputs {
                let input = input.expect("invalid file").path();

                println!("input: {:?}", input);

                let mut f = fs::File::open(input).expect("failed to open");
                let mut input = Vec::new();
                f.read_to_end(&mut input).expect("failed to read file");

                de(&input);
            }
        }
    }

    #[test]
    fn crashes() {
        if let Ok(crashes) = fs::read_dir("../../target/fuzz_parse/crashes") {
            for crash in crashes {
                let crash = crash.expect("invalid file").path();

                println!("repro: {:?}", crash);

                let mut f = fs::File::open(crash).expect("failed to open");
                let mut crash = Vec::new();
                f.read_to_end(&mut crash).expect("failed to read file");

                de(&crash);
            }
        }
    }
}
