//! Launch relay: replay launch records arriving as JSON lines, and append
//! local launches for other screens to pick up.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};

use thiserror::Error;

use crate::show::launch::LaunchRecord;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad launch record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot watch relay file: {0}")]
    Watch(#[from] notify::Error),
}

pub enum RelaySource {
    Stdin,
    File(PathBuf),
}

impl RelaySource {
    /// `-` means stdin.
    pub fn from_path(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            RelaySource::Stdin
        } else {
            RelaySource::File(path)
        }
    }
}

/// Parse one relay line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<LaunchRecord>, RelayError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

fn forward(line: &str, tx: &Sender<LaunchRecord>) -> bool {
    match parse_line(line) {
        Ok(Some(record)) => tx.send(record).is_ok(),
        Ok(None) => true,
        Err(e) => {
            log::warn!("skipping relay line: {e}");
            true
        }
    }
}

/// Start a background reader. Records arrive on the returned channel;
/// reader failures are logged and end the stream.
pub fn spawn_reader(source: RelaySource) -> Receiver<LaunchRecord> {
    let (tx, rx) = channel::<LaunchRecord>();

    match source {
        RelaySource::Stdin => {
            std::thread::spawn(move || {
                log::info!("relay reading stdin");
                let mut stdin = std::io::BufReader::new(std::io::stdin());
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match stdin.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            if !forward(&decode(&buf), &tx) {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            log::warn!("relay stdin closed: {e}");
                            break;
                        }
                    }
                }
            });
        }
        RelaySource::File(path) => {
            std::thread::spawn(move || {
                if let Err(e) = follow_file(&path, &tx) {
                    log::warn!("relay on {} stopped: {e}", path.display());
                }
            });
        }
    }

    rx
}

/// Lossy line decoding. Invalid UTF-8 fails later as a JSON error and the
/// line is skipped like any other bad record.
fn decode(line: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(line)
}

/// Replay what the file already holds, then every line appended to it.
fn follow_file(path: &Path, tx: &Sender<LaunchRecord>) -> Result<(), RelayError> {
    let mut tail = Tail::default();
    for line in tail.read_new(path)? {
        if !forward(&line, tx) {
            return Ok(());
        }
    }

    let (file_tx, file_rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = file_tx.send(res);
    })?;
    notify::Watcher::watch(&mut watcher, path, notify::RecursiveMode::NonRecursive)?;
    log::info!("relay watching {}", path.display());

    while let Ok(event) = file_rx.recv() {
        if let Err(e) = event {
            log::warn!("relay watch event error: {e}");
            continue;
        }
        let lines = match tail.read_new(path) {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("relay read of {} failed: {e}", path.display());
                continue;
            }
        };
        for line in lines {
            if !forward(&line, tx) {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Byte offset of the last complete line consumed from a growing file.
#[derive(Debug, Default)]
struct Tail {
    offset: u64,
}

impl Tail {
    /// Complete lines appended since the last call. A file that shrank was
    /// truncated or replaced and is read again from the start.
    fn read_new(&mut self, path: &Path) -> Result<Vec<String>, RelayError> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        if len < self.offset {
            self.offset = 0;
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        // A partial trailing line waits for its newline
        let complete = buf.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        self.offset += complete as u64;
        Ok(buf[..complete]
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| decode(l.strip_suffix(b"\r").unwrap_or(l)).into_owned())
            .collect())
    }
}

/// Appends launch records as JSON lines.
pub struct RelayWriter {
    out: BufWriter<File>,
}

impl RelayWriter {
    pub fn open(path: &Path) -> Result<Self, RelayError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("relay writing {}", path.display());
        Ok(RelayWriter {
            out: BufWriter::new(file),
        })
    }

    pub fn send(&mut self, record: &LaunchRecord) -> Result<(), RelayError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::entity::{FireworkKind, Rgb};

    fn temp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("skyburst-{}-{}", name, std::process::id()))
    }

    fn record() -> LaunchRecord {
        LaunchRecord {
            x: 10.0,
            y: 920.0,
            target_y: 300.0,
            scale: 1.2,
            points: Some(60),
            firework_type: FireworkKind::Standard {
                color: Rgb::new(255, 50, 80),
            },
            word: None,
            text_size: 0.0,
            privileged: false,
        }
    }

    #[test]
    fn test_parse_line_skips_blank() {
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn test_parse_line_accepts_minimal_record() {
        let line = r#"{"x":5,"targetY":200,"scale":0.5,"fireworkType":{"type":"standard","color":{"r":1,"g":2,"b":3}},"extra":true}"#;
        let r = parse_line(line).unwrap().unwrap();
        assert_eq!(r.x, 5.0);
        assert_eq!(r.word, None);
        assert!(!r.privileged);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(matches!(parse_line("{nope"), Err(RelayError::Json(_))));
    }

    #[test]
    fn test_tail_reads_only_complete_new_lines() {
        let path = temp("tail");
        std::fs::write(&path, "a\nb\npart").unwrap();
        let mut tail = Tail::default();
        assert_eq!(tail.read_new(&path).unwrap(), vec!["a", "b"]);
        assert!(tail.read_new(&path).unwrap().is_empty());

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"ial\nc\n").unwrap();
        assert_eq!(tail.read_new(&path).unwrap(), vec!["partial", "c"]);

        std::fs::write(&path, "z\n").unwrap();
        assert_eq!(tail.read_new(&path).unwrap(), vec!["z"]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_utf8_line_does_not_stall_the_tail() {
        let path = temp("badutf8");
        let good = serde_json::to_string(&record()).unwrap();
        let mut bytes = b"\xff\xfe garbage\n".to_vec();
        bytes.extend_from_slice(good.as_bytes());
        bytes.push(b'\n');
        std::fs::write(&path, &bytes).unwrap();

        let mut tail = Tail::default();
        let lines = tail.read_new(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(parse_line(&lines[0]).is_err());
        assert_eq!(parse_line(&lines[1]).unwrap(), Some(record()));
        assert_eq!(tail.offset, bytes.len() as u64);
        assert!(tail.read_new(&path).unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_tail_waits_for_missing_file() {
        let mut tail = Tail::default();
        assert!(tail.read_new(&temp("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_writer_output_replays() {
        let path = temp("writer");
        let _ = std::fs::remove_file(&path);
        let mut w = RelayWriter::open(&path).unwrap();
        w.send(&record()).unwrap();
        w.send(&record()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(parse_line(lines[1]).unwrap(), Some(record()));
        let _ = std::fs::remove_file(&path);
    }
}
