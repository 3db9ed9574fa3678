//! Source-map assembly.
//!
//! The printer records `(generated_line, generated_col, source_index,
//! original_line, original_col)` tuples as it writes; this builder encodes
//! them into a standard version-3 VLQ map, one per output file.

use ahashmap::AHashMap;
use serde::Serialize;

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    generated_line: u32,
    generated_col: u32,
    source: u32,
    original_line: u32,
    original_col: u32,
}

#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    source_index: AHashMap<String, u32>,
    segments: Vec<Segment>,
}

#[derive(Serialize)]
struct SourceMapJson<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    names: [&'a str; 0],
    mappings: String,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, path: &str) -> u32 {
        if let Some(&index) = self.source_index.get(path) {
            return index;
        }
        let index = self.sources.len() as u32;
        self.sources.push(path.to_string());
        self.source_index.insert(path.to_string(), index);
        index
    }

    /// Records one mapping tuple. Lines and columns are 0-based, like the
    /// encoded form.
    pub fn add_mapping(
        &mut self,
        generated_line: u32,
        generated_col: u32,
        source: u32,
        original_line: u32,
        original_col: u32,
    ) {
        self.segments.push(Segment {
            generated_line,
            generated_col,
            source,
            original_line,
            original_col,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Encodes the collected tuples as a version-3 source map.
    pub fn build(mut self, file: &str) -> String {
        self.segments
            .sort_by_key(|s| (s.generated_line, s.generated_col));

        let last_line = self.segments.last().map(|s| s.generated_line).unwrap_or(0);
        let mut mappings = String::new();
        let mut cursor = 0usize;
        let mut prev_source: i64 = 0;
        let mut prev_orig_line: i64 = 0;
        let mut prev_orig_col: i64 = 0;
        for line in 0..=last_line {
            if line > 0 {
                mappings.push(';');
            }
            let mut prev_gen_col: i64 = 0;
            let mut first = true;
            while cursor < self.segments.len() && self.segments[cursor].generated_line == line {
                let segment = self.segments[cursor];
                cursor += 1;
                if !first {
                    mappings.push(',');
                }
                first = false;
                encode_vlq(&mut mappings, segment.generated_col as i64 - prev_gen_col);
                encode_vlq(&mut mappings, segment.source as i64 - prev_source);
                encode_vlq(&mut mappings, segment.original_line as i64 - prev_orig_line);
                encode_vlq(&mut mappings, segment.original_col as i64 - prev_orig_col);
                prev_gen_col = segment.generated_col as i64;
                prev_source = segment.source as i64;
                prev_orig_line = segment.original_line as i64;
                prev_orig_col = segment.original_col as i64;
            }
        }

        let json = SourceMapJson {
            version: 3,
            file,
            sources: &self.sources,
            names: [],
            mappings,
        };
        serde_json::to_string(&json).expect("source map serialization is infallible")
    }
}

fn encode_vlq(out: &mut String, value: i64) {
    // sign bit lives in the lowest bit of the first digit
    let mut vlq: u64 = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_known_vlq_values() {
        let mut out = String::new();
        encode_vlq(&mut out, 0);
        assert_eq!(out, "A");
        let mut out = String::new();
        encode_vlq(&mut out, 1);
        assert_eq!(out, "C");
        let mut out = String::new();
        encode_vlq(&mut out, -1);
        assert_eq!(out, "D");
        let mut out = String::new();
        encode_vlq(&mut out, 16);
        assert_eq!(out, "gB");
    }

    #[test]
    fn builds_a_minimal_map() {
        let mut builder = SourceMapBuilder::new();
        let src = builder.add_source("/src/entry.ts");
        builder.add_mapping(0, 0, src, 0, 0);
        builder.add_mapping(1, 0, src, 1, 0);
        let map = builder.build("out.js");
        let parsed: serde_json::Value = serde_json::from_str(&map).unwrap();
        assert_eq!(parsed["version"], 3);
        assert_eq!(parsed["sources"][0], "/src/entry.ts");
        assert_eq!(parsed["mappings"], "AAAA;AACA");
    }
}
