use crate::output::records::{AgentsRow, BranchRow, BuildRow, QueueRow, Record};
use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("flush failed: {0}")]
    Flush(#[from] std::io::Error),

    #[error("sink for {path} is already closed")]
    Closed { path: PathBuf },
}

/// The four datasets persisted per day partition; they rotate together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Queue,
    Builds,
    Agents,
    Branches,
}

impl Dataset {
    pub fn tag(self) -> &'static str {
        match self {
            Dataset::Queue => "queue",
            Dataset::Builds => "builds",
            Dataset::Agents => "agents",
            Dataset::Branches => "branches",
        }
    }

    /// Deterministic file name for one (dataset, day) partition.
    pub fn file_name(self, day: NaiveDate) -> String {
        format!("{}_{}.csv", self.tag(), day.format("%Y%m%d"))
    }
}

/// An append-only, header-tagged record stream for one (dataset, day).
///
/// Owns the file handle and the CSV writer as one resource value; `close`
/// flushes and releases, and is a no-op when already closed. Dropping an
/// unclosed sink loses at most unflushed buffered rows, never written ones.
pub struct DaySink<R: Record> {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    _record: PhantomData<R>,
}

impl<R: Record> DaySink<R> {
    /// Creates (or truncates) the stream and writes the header row.
    pub fn create(dir: &Path, dataset: Dataset, day: NaiveDate) -> Result<Self, SinkError> {
        let path = dir.join(dataset.file_name(day));
        let mut writer = WriterBuilder::new()
            .delimiter(b';')
            .quote_style(QuoteStyle::Always)
            .has_headers(false)
            .from_path(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;
        writer.write_record(R::HEADERS)?;
        writer.flush()?;
        debug!(path = %path.display(), "opened output stream");
        Ok(Self {
            path,
            writer: Some(writer),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row. Not durable until `flush`.
    pub fn append(&mut self, row: &R) -> Result<(), SinkError> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.serialize(row)?;
                Ok(())
            }
            None => Err(SinkError::Closed {
                path: self.path.clone(),
            }),
        }
    }

    /// Forces buffered rows to stable storage.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.flush()?;
                Ok(())
            }
            None => Err(SinkError::Closed {
                path: self.path.clone(),
            }),
        }
    }

    /// Flushes then releases the stream; a no-op when already closed.
    pub fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            debug!(path = %self.path.display(), "closed output stream");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

/// The four open streams of one day partition.
pub struct DayOutputs {
    pub day: NaiveDate,
    pub queue: DaySink<QueueRow>,
    pub builds: DaySink<BuildRow>,
    pub agents: DaySink<AgentsRow>,
    pub branches: DaySink<BranchRow>,
}

impl DayOutputs {
    pub fn open(dir: &Path, day: NaiveDate) -> Result<Self, SinkError> {
        Ok(Self {
            day,
            queue: DaySink::create(dir, Dataset::Queue, day)?,
            builds: DaySink::create(dir, Dataset::Builds, day)?,
            agents: DaySink::create(dir, Dataset::Agents, day)?,
            branches: DaySink::create(dir, Dataset::Branches, day)?,
        })
    }

    /// Flushes and closes all four streams. The first error wins but every
    /// sink is still released.
    pub fn close(&mut self) -> Result<(), SinkError> {
        let results = [
            self.queue.close(),
            self.builds.close(),
            self.agents.close(),
            self.branches.close(),
        ];
        for result in results {
            result?;
        }
        Ok(())
    }
}
