//! Minimal FASTA reading for seeding a sequence repository.
//!
//! Plain or gzip-compressed files; record names are the first whitespace
//! token of the header line.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::RefgetError;
use crate::repository::InMemorySequenceRepository;

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, RefgetError> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "gz" || e == "bgz")
    {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Read all `(name, sequence)` records of a FASTA file.
pub fn read_fasta(path: &Path) -> Result<Vec<(String, String)>, RefgetError> {
    let reader = open_reader(path)?;
    let mut records = Vec::new();
    let mut name: Option<String> = None;
    let mut sequence = String::new();

    for line in reader.lines() {
        let line = line?;
        if let Some(header) = line.strip_prefix('>') {
            if let Some(name) = name.take() {
                records.push((name, std::mem::take(&mut sequence)));
            }
            name = Some(
                header
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            );
        } else if name.is_some() {
            sequence.push_str(line.trim());
        }
    }
    if let Some(name) = name {
        records.push((name, sequence));
    }
    Ok(records)
}

impl InMemorySequenceRepository {
    /// Load every FASTA record, aliasing each name in `namespace`.
    ///
    /// Returns the number of records loaded.
    pub fn load_fasta(&mut self, namespace: &str, path: &Path) -> Result<usize, RefgetError> {
        let records = read_fasta(path)?;
        let count = records.len();
        for (name, sequence) in records {
            let accession = self.add_sequence(&sequence);
            self.add_alias(namespace, &name, &accession);
        }
        Ok(count)
    }
}
