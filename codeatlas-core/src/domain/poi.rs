// codeatlas-core/src/domain/poi.rs
//
// A Point of Interest: a named code entity (function, class, variable,
// import, table, ...) with a location, discovered by the
// FileAnalysisWorker from a single file.

use serde::{Deserialize, Serialize};

/// A Point of Interest extracted from one file.
///
/// `id` is deterministic: `hash(file_path ‖ name ‖ type ‖ start_line)`
/// (spec.md §3 invariants), so re-running the pipeline on unchanged file
/// content always produces the same id and `InsertPOIs` becomes an
/// insert-or-replace with no duplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poi {
    pub id: String,
    pub file_id: String,
    pub run_id: String,
    pub name: String,
    pub poi_type: String,
    pub start_line: u32,
    pub end_line: u32,
    pub snippet: String,
}

impl Poi {
    /// Builds a POI, computing its deterministic id from the file path and
    /// the fields the id is defined over.
    pub fn new(
        file_path: &str,
        file_id: String,
        run_id: String,
        name: String,
        poi_type: String,
        start_line: u32,
        end_line: u32,
        snippet: String,
    ) -> Self {
        let id = Self::compute_id(file_path, &name, &poi_type, start_line);
        Self {
            id,
            file_id,
            run_id,
            name,
            poi_type,
            start_line,
            end_line,
            snippet,
        }
    }

    /// `hash(file_path ‖ name ‖ type ‖ start_line)`, computed identically
    /// by every component that needs to recognize a POI across runs.
    pub fn compute_id(file_path: &str, name: &str, poi_type: &str, start_line: u32) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(poi_type.as_bytes());
        hasher.update(b"\0");
        hasher.update(start_line.to_le_bytes().as_slice());
        hasher.finalize().to_hex().to_string()
    }
}

/// Raw shape returned by the LLM for file extraction (spec.md §6 wire
/// contracts): `{"pois":[{"name","type","start_line","end_line","snippet"}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPoi {
    pub name: String,
    #[serde(rename = "type")]
    pub poi_type: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileExtractionResponse {
    pub pois: Vec<RawPoi>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_poi_id_is_deterministic() {
        let a = Poi::compute_id("src/a.py", "foo", "function", 1);
        let b = Poi::compute_id("src/a.py", "foo", "function", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_poi_id_changes_with_any_field() {
        let base = Poi::compute_id("src/a.py", "foo", "function", 1);
        assert_ne!(base, Poi::compute_id("src/b.py", "foo", "function", 1));
        assert_ne!(base, Poi::compute_id("src/a.py", "bar", "function", 1));
        assert_ne!(base, Poi::compute_id("src/a.py", "foo", "class", 1));
        assert_ne!(base, Poi::compute_id("src/a.py", "foo", "function", 2));
    }

    #[test]
    fn test_file_extraction_response_deserializes() {
        let json = r#"{"pois":[{"name":"foo","type":"function","start_line":1,"end_line":2,"snippet":"def foo():"}]}"#;
        let parsed: FileExtractionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.pois.len(), 1);
        assert_eq!(parsed.pois[0].name, "foo");
    }
}
