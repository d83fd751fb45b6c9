// SPDX-License-Identifier: GPL-3.0-only

//! Kernel log reader backed by `journalctl --follow`
//!
//! A reader thread parses the JSON export of journalctl and feeds a channel;
//! [`LogSource::wait`] is a bounded receive on that channel.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use netmount_contracts::{LogError, LogSource};
use netmount_types::{LogEntry, LogPriority};

#[derive(Debug, Deserialize)]
struct JournalRecord {
    #[serde(rename = "MESSAGE")]
    message: Option<Value>,
    #[serde(rename = "SYSLOG_IDENTIFIER")]
    identifier: Option<String>,
    #[serde(rename = "_TRANSPORT")]
    transport: Option<String>,
    #[serde(rename = "__REALTIME_TIMESTAMP")]
    realtime: Option<String>,
}

/// journalctl exports non UTF-8 messages as byte arrays.
fn message_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Array(items) => {
            let bytes: Vec<u8> = items
                .iter()
                .filter_map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => None,
    }
}

pub(crate) fn parse_entry(line: &str) -> Option<LogEntry> {
    let record: JournalRecord = serde_json::from_str(line).ok()?;
    Some(LogEntry {
        identifier: record.identifier,
        transport: record.transport,
        message: message_text(record.message?)?,
        realtime_usec: record.realtime.and_then(|usec| usec.parse().ok()),
    })
}

fn read_entries(output: impl Read, sender: Sender<LogEntry>) {
    for line in BufReader::new(output).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to read journalctl output: {e}");
                break;
            }
        };

        match parse_entry(&line) {
            Some(entry) => {
                if sender.send(entry).is_err() {
                    break;
                }
            }
            None => tracing::debug!("Skipping unparsable journal record"),
        }
    }
}

pub struct JournalctlSource {
    child: Child,
    entries: Receiver<LogEntry>,
    reader: Option<JoinHandle<()>>,
    pending: VecDeque<LogEntry>,
    closed: bool,
}

impl JournalctlSource {
    /// Follow kernel messages of the current boot, starting at the end of
    /// the journal.
    pub fn spawn(min_priority: LogPriority) -> Result<Self, LogError> {
        let mut child = Command::new("journalctl")
            .args(["--follow", "--boot", "--lines=0", "--output=json", "--quiet"])
            .arg(format!("--priority={}", min_priority.level()))
            .arg("SYSLOG_IDENTIFIER=kernel")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LogError::Spawn(format!("failed to run journalctl: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(LogError::Spawn("journalctl stdout not captured".to_string()));
        };

        let (sender, entries) = mpsc::channel();
        let reader = match thread::Builder::new()
            .name("journal-reader".to_string())
            .spawn(move || read_entries(stdout, sender))
        {
            Ok(reader) => reader,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        tracing::debug!("journalctl started (pid {})", child.id());
        Ok(Self {
            child,
            entries,
            reader: Some(reader),
            pending: VecDeque::new(),
            closed: false,
        })
    }

    fn collect_ready(&mut self) {
        while let Ok(entry) = self.entries.try_recv() {
            self.pending.push_back(entry);
        }
    }
}

impl LogSource for JournalctlSource {
    fn seek_tail(&mut self) -> Result<(), LogError> {
        self.collect_ready();
        if !self.pending.is_empty() {
            tracing::debug!("Discarding {} journal entries", self.pending.len());
            self.pending.clear();
        }
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<bool, LogError> {
        if !self.pending.is_empty() {
            return Ok(true);
        }

        match self.entries.recv_timeout(timeout) {
            Ok(entry) => {
                self.pending.push_back(entry);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(LogError::Closed),
        }
    }

    fn drain(&mut self) -> Result<Vec<LogEntry>, LogError> {
        self.collect_ready();
        Ok(self.pending.drain(..).collect())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.child.kill() {
            tracing::debug!("journalctl already gone: {e}");
        }
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take()
            && reader.join().is_err()
        {
            tracing::warn!("journal reader thread panicked");
        }
    }
}

impl Drop for JournalctlSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// A source around an idle `cat` child, fed by hand through `sender`.
    fn source() -> (JournalctlSource, Sender<LogEntry>) {
        let child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn cat");
        let (sender, entries) = mpsc::channel();
        let source = JournalctlSource {
            child,
            entries,
            reader: None,
            pending: VecDeque::new(),
            closed: false,
        };
        (source, sender)
    }

    #[test]
    fn wait_returns_at_once_while_entries_are_pending() {
        let (mut source, sender) = source();
        sender.send(LogEntry::kernel("first")).unwrap();
        assert!(source.wait(Duration::from_secs(5)).unwrap());

        drop(sender);
        assert!(source.wait(Duration::from_secs(5)).unwrap());

        let messages: Vec<String> = source
            .drain()
            .unwrap()
            .into_iter()
            .map(|entry| entry.message)
            .collect();
        assert_eq!(messages, vec!["first"]);
        assert!(matches!(source.wait(Duration::from_millis(10)), Err(LogError::Closed)));
    }

    #[test]
    fn wait_times_out_without_entries() {
        let (mut source, _sender) = source();

        assert!(!source.wait(Duration::from_millis(10)).unwrap());
        assert!(source.drain().unwrap().is_empty());
    }

    #[test]
    fn seek_tail_discards_buffered_entries() {
        let (mut source, sender) = source();
        sender.send(LogEntry::kernel("old")).unwrap();
        sender.send(LogEntry::kernel("older")).unwrap();

        source.seek_tail().unwrap();
        sender.send(LogEntry::kernel("new")).unwrap();

        assert!(source.wait(Duration::from_millis(10)).unwrap());
        let messages: Vec<String> = source
            .drain()
            .unwrap()
            .into_iter()
            .map(|entry| entry.message)
            .collect();
        assert_eq!(messages, vec!["new"]);
    }

    #[test]
    fn close_reaps_child_once() {
        let (mut source, _sender) = source();

        source.close();
        assert!(source.closed);
        assert!(source.child.try_wait().unwrap().is_some());

        source.close();
        drop(source);
    }

    #[test]
    fn drop_closes_and_joins_reader() {
        let mut child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("spawn cat");
        let stdout = child.stdout.take().expect("stdout");
        let (sender, entries) = mpsc::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let reader = {
            let finished = finished.clone();
            thread::spawn(move || {
                read_entries(stdout, sender);
                finished.store(true, Ordering::SeqCst);
            })
        };
        let source = JournalctlSource {
            child,
            entries,
            reader: Some(reader),
            pending: VecDeque::new(),
            closed: false,
        };

        drop(source);

        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn parses_kernel_record() {
        let line = r#"{"__REALTIME_TIMESTAMP":"1718000000123456","PRIORITY":"3","SYSLOG_IDENTIFIER":"kernel","_TRANSPORT":"kernel","MESSAGE":"CIFS: VFS: \\\\nas has not responded in 180 seconds. Reconnecting..."}"#;

        let entry = parse_entry(line).expect("entry");

        assert!(entry.is_kernel());
        assert_eq!(entry.realtime_usec, Some(1_718_000_000_123_456));
        assert!(entry.message.starts_with("CIFS: VFS: \\\\nas"));
    }

    #[test]
    fn decodes_byte_array_messages() {
        let line = r#"{"SYSLOG_IDENTIFIER":"kernel","MESSAGE":[67,73,70,83,58,32,255]}"#;

        let entry = parse_entry(line).expect("entry");

        assert!(entry.message.starts_with("CIFS: "));
        assert_eq!(entry.transport, None);
    }

    #[test]
    fn skips_records_without_message() {
        assert!(parse_entry(r#"{"SYSLOG_IDENTIFIER":"kernel","MESSAGE":null}"#).is_none());
        assert!(parse_entry("not json").is_none());
    }

    #[test]
    fn reader_forwards_entries_in_order() {
        let output = concat!(
            r#"{"SYSLOG_IDENTIFIER":"kernel","MESSAGE":"first"}"#,
            "\n",
            "garbage\n",
            r#"{"SYSLOG_IDENTIFIER":"kernel","MESSAGE":"second"}"#,
            "\n",
        );
        let (sender, receiver) = mpsc::channel();

        read_entries(output.as_bytes(), sender);

        let messages: Vec<String> = receiver.iter().map(|entry| entry.message).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }
}
