//! TSV export of raw samples for external analysis

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::samples::Sample;

/// TSV exporter for benchmark samples
pub struct TsvExporter {
    basename: String,
}

impl TsvExporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            basename: path.as_ref().to_string_lossy().to_string(),
        }
    }

    pub fn samples_path(&self) -> PathBuf {
        PathBuf::from(format!("{}-samples.tsv", self.basename))
    }

    /// Write one row per sample; returns the file written
    pub fn export_samples<'a>(&self, samples: impl IntoIterator<Item = &'a Sample>) -> Result<PathBuf> {
        let path = self.samples_path();
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut f = BufWriter::new(file);

        writeln!(
            f,
            "op\tworker\titeration\tstart_utc\tduration_us\tkeys\tbytes\tsuccess\terror"
        )?;
        for s in samples {
            writeln!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                s.op.as_str(),
                s.worker,
                s.iteration,
                s.started_at.to_rfc3339(),
                s.duration.as_micros(),
                s.keys,
                s.bytes,
                u8::from(s.is_success()),
                s.error.as_deref().unwrap_or("").replace(['\t', '\n'], " ")
            )?;
        }
        f.flush()?;
        Ok(path)
    }
}
