use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::sha256_hex;

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationDocument {
    pub data: TranslationData,
}

/// Surahs stay untyped until they are written, so a malformed record fails
/// inside the update transaction instead of at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationData {
    pub surahs: Vec<Value>,
}

/// A single verse. `number` is global across the whole document, not per surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verse<'a> {
    pub number: i64,
    pub text: &'a str,
}

impl TranslationDocument {
    pub fn verses<'a>(&'a self) -> impl Iterator<Item = Result<Verse<'a>>> + 'a {
        self.data
            .surahs
            .iter()
            .enumerate()
            .flat_map(|(surah_index, surah)| {
                let verses: Box<dyn Iterator<Item = Result<Verse<'a>>> + 'a> =
                    match surah.get("ayahs").and_then(Value::as_array) {
                        Some(ayahs) => Box::new(ayahs.iter().enumerate().map(
                            move |(ayah_index, ayah)| {
                                parse_verse(ayah).with_context(|| {
                                    format!("surah {} ayah {}", surah_index + 1, ayah_index + 1)
                                })
                            },
                        )),
                        None => Box::new(std::iter::once(Err(anyhow!(
                            "surah {} has no ayahs array",
                            surah_index + 1
                        )))),
                    };
                verses
            })
    }

    pub fn surah_count(&self) -> usize {
        self.data.surahs.len()
    }

    pub fn verse_count(&self) -> usize {
        self.data
            .surahs
            .iter()
            .filter_map(|surah| surah.get("ayahs").and_then(Value::as_array))
            .map(Vec::len)
            .sum()
    }

    /// Numbers that occur more than once among well-formed verses.
    ///
    /// `load_document` rejects any document where this is non-empty: a
    /// repeated number would make the stored text depend on record order.
    pub fn duplicate_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for verse in self.verses().filter_map(Result::ok) {
            if !seen.insert(verse.number) && !duplicates.contains(&verse.number) {
                duplicates.push(verse.number);
            }
        }
        duplicates
    }
}

fn parse_verse(ayah: &Value) -> Result<Verse<'_>> {
    let number = ayah
        .get("number")
        .context("missing number")?
        .as_i64()
        .context("number is not an integer")?;
    let text = ayah
        .get("text")
        .context("missing text")?
        .as_str()
        .context("text is not a string")?;
    Ok(Verse { number, text })
}

/// A parsed document together with the digest of the bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: TranslationDocument,
    pub sha256: String,
}

pub fn load_document(path: &Path) -> Result<LoadedDocument> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document: TranslationDocument = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let duplicates = document.duplicate_ids();
    if !duplicates.is_empty() {
        bail!(
            "{} repeats verse numbers {:?}; numbers must be unique across surahs",
            path.display(),
            duplicates
        );
    }

    Ok(LoadedDocument {
        document,
        sha256: sha256_hex(&raw),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateTarget {
    pub table: String,
    pub id_column: String,
    pub text_column: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateCounts {
    pub surah_count: usize,
    pub verse_count: usize,
    pub verses_written: usize,
    pub rows_changed: usize,
    pub unmatched_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_path: String,
    pub source_sha256: String,
    pub db_path: String,
    pub strict: bool,
    pub target: UpdateTarget,
    pub counts: UpdateCounts,
    pub unmatched_ids: Vec<i64>,
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
      "code": 200,
      "data": {
        "edition": { "identifier": "en.sahih" },
        "surahs": [
          {
            "number": 1,
            "name": "Al-Fatiha",
            "ayahs": [
              { "number": 1, "text": "A", "numberInSurah": 1, "juz": 1 },
              { "number": 2, "text": "B", "numberInSurah": 2, "juz": 1 }
            ]
          },
          { "number": 2, "ayahs": [ { "number": 3, "text": "C" } ] }
        ]
      }
    }
    "#;

    #[test]
    fn document_ignores_extra_fields_and_flattens_in_order() {
        let document: TranslationDocument =
            serde_json::from_str(SAMPLE).expect("sample should deserialize");

        let flattened = document
            .verses()
            .map(|verse| verse.map(|verse| (verse.number, verse.text)))
            .collect::<Result<Vec<_>>>()
            .expect("all verses well-formed");
        assert_eq!(flattened, vec![(1, "A"), (2, "B"), (3, "C")]);
        assert_eq!(document.verse_count(), 3);
        assert!(document.duplicate_ids().is_empty());
    }

    #[test]
    fn verse_count_ignores_chapter_boundaries_and_empty_chapters() {
        let raw = r#"{"data":{"surahs":[
            {"ayahs":[]},
            {"ayahs":[{"number":10,"text":"x"}]},
            {"ayahs":[{"number":11,"text":"y"},{"number":12,"text":"z"},{"number":13,"text":"w"}]}
        ]}}"#;
        let document: TranslationDocument = serde_json::from_str(raw).expect("valid document");
        assert_eq!(document.verse_count(), 4);
        assert_eq!(document.verses().count(), 4);
    }

    #[test]
    fn duplicate_ids_are_detected_across_surahs() {
        let raw = r#"{"data":{"surahs":[
            {"ayahs":[{"number":1,"text":"a"},{"number":2,"text":"b"}]},
            {"ayahs":[{"number":2,"text":"c"},{"number":2,"text":"d"}]}
        ]}}"#;
        let document: TranslationDocument = serde_json::from_str(raw).expect("valid document");
        assert_eq!(document.duplicate_ids(), vec![2]);
    }

    #[test]
    fn malformed_records_surface_while_iterating() {
        let raw = r#"{"data":{"surahs":[
            {"ayahs":[{"number":1,"text":"A"},{"number":2}]},
            {"name":"no ayahs"},
            {"ayahs":[{"number":"3","text":"C"}]}
        ]}}"#;
        let document: TranslationDocument = serde_json::from_str(raw).expect("top level is valid");

        let verses = document.verses().collect::<Vec<_>>();
        assert_eq!(verses.len(), 4);
        assert_eq!(
            *verses[0].as_ref().expect("first verse is valid"),
            Verse { number: 1, text: "A" }
        );

        let messages = verses[1..]
            .iter()
            .map(|verse| format!("{:#}", verse.as_ref().expect_err("malformed")))
            .collect::<Vec<_>>();
        assert_eq!(messages[0], "surah 1 ayah 2: missing text");
        assert_eq!(messages[1], "surah 2 has no ayahs array");
        assert_eq!(messages[2], "surah 3 ayah 1: number is not an integer");
        assert_eq!(document.verse_count(), 3);
    }

    #[test]
    fn load_document_rejects_wrong_shape_and_duplicates() {
        let dir = tempfile::tempdir().expect("tempdir");

        let no_surahs = dir.path().join("no_surahs.json");
        fs::write(&no_surahs, r#"{"data":{"edition":{}}}"#).expect("write fixture");
        let err = load_document(&no_surahs).expect_err("missing surahs must fail");
        assert!(err.to_string().contains("failed to parse"));

        let missing_text = dir.path().join("missing_text.json");
        fs::write(&missing_text, r#"{"data":{"surahs":[{"ayahs":[{"number":1}]}]}}"#)
            .expect("write fixture");
        let loaded = load_document(&missing_text).expect("record errors are deferred");
        assert_eq!(loaded.document.verse_count(), 1);

        let duplicated = dir.path().join("duplicated.json");
        fs::write(
            &duplicated,
            r#"{"data":{"surahs":[{"ayahs":[{"number":1,"text":"a"}]},{"ayahs":[{"number":1,"text":"b"}]}]}}"#,
        )
        .expect("write fixture");
        let err = load_document(&duplicated).expect_err("duplicates must fail");
        assert!(err.to_string().contains("repeats verse numbers"));

        let valid = dir.path().join("valid.json");
        fs::write(&valid, SAMPLE).expect("write fixture");
        let loaded = load_document(&valid).expect("valid document loads");
        assert_eq!(loaded.document.verse_count(), 3);
        assert_eq!(loaded.sha256.len(), 64);

        let absent = dir.path().join("absent.json");
        let err = load_document(&absent).expect_err("absent file must fail");
        assert!(err.to_string().contains("failed to read"));
    }
}
