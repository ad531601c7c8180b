use super::LedgerStorage;
use crate::Result;
use async_trait::async_trait;
use ledger_core::{event_log, Ledger, LedgerEvent};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// The `ledger.json` event log on disk
///
/// A missing file reads as an empty log. Writes append in place when the
/// file already holds a prefix of the new log, and otherwise replace the
/// file through a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    /// Log at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents; `None` when the file does not exist
    async fn read_text(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parsed events, oldest first
    pub async fn read_events(&self) -> Result<Vec<LedgerEvent>> {
        match self.read_text().await? {
            Some(text) => Ok(event_log::parse(&text)?),
            None => Ok(Vec::new()),
        }
    }

    /// Make the file hold exactly `events`
    pub async fn write_events(&self, events: &[LedgerEvent]) -> Result<()> {
        if let Some(text) = self.read_text().await? {
            let on_disk = event_log::parse(&text)?;
            if events.starts_with(&on_disk) && text.ends_with(event_log::TAIL) {
                let new = &events[on_disk.len()..];
                if !new.is_empty() {
                    self.append(text.len(), new).await?;
                }
                return Ok(());
            }
        }
        self.rewrite(events).await
    }

    /// Replace the closing bracket of a non-empty log with `new` events
    async fn append(&self, len: usize, new: &[LedgerEvent]) -> Result<()> {
        let suffix = event_log::append_suffix(new)?;
        let keep = (len - event_log::TAIL.len()) as u64;

        let mut file = fs::OpenOptions::new().write(true).open(&self.path).await?;
        file.set_len(keep).await?;
        file.seek(std::io::SeekFrom::Start(keep)).await?;
        file.write_all(suffix.as_bytes()).await?;
        file.sync_all().await?;

        tracing::debug!(path = ?self.path, appended = new.len(), "Ledger file appended");
        Ok(())
    }

    /// Write the whole log to a temporary file and rename it into place
    async fn rewrite(&self, events: &[LedgerEvent]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let text = event_log::serialize(events)?;
        let tmp = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(text.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = ?self.path, events = events.len(), "Ledger file rewritten");
        Ok(())
    }
}

/// Storage backed by a [`LedgerFile`]
#[derive(Debug, Clone)]
pub struct FileStorage {
    file: LedgerFile,
    config: ledger_core::Config,
}

impl FileStorage {
    /// Storage over the log at `path`, replayed with the default ledger config
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, ledger_core::Config::default())
    }

    /// Storage over the log at `path`, replayed with `config`
    pub fn with_config(path: impl Into<PathBuf>, config: ledger_core::Config) -> Self {
        Self {
            file: LedgerFile::new(path),
            config,
        }
    }

    /// Underlying file
    pub fn file(&self) -> &LedgerFile {
        &self.file
    }
}

#[async_trait]
impl LedgerStorage for FileStorage {
    async fn read(&self) -> Result<Ledger> {
        let events = self.file.read_events().await?;
        let mut ledger = Ledger::with_config(self.config.clone());
        ledger.replay(events)?;
        Ok(ledger)
    }

    async fn write(&self, ledger: &Ledger) -> Result<()> {
        self.file.write_events(ledger.event_log()).await
    }
}
