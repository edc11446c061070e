use anyhow::Result;
use flume::Sender;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::thread::{self, JoinHandle};
use trinket_img::landmarks::Detection;
use trinket_img::session::Event;
use tracing::{debug, warn};

/// Opens the landmark stream written by the face detector. `-` is stdin.
pub fn open(source: &str) -> Result<Box<dyn BufRead + Send>> {
    Ok(match source {
        "-" => Box::new(BufReader::new(io::stdin())),
        path => Box::new(BufReader::new(File::open(path)?)),
    })
}

/// One detection per non-blank line. Lines that fail to parse are logged and
/// skipped rather than ending the stream.
pub fn detections(reader: impl BufRead) -> impl Iterator<Item = Detection> {
    reader
        .lines()
        .map_while(|line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Landmark stream read failed: {e:?}");
                None
            }
        })
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match Detection::from_json(&line) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Skipping malformed detection: {e}");
                None
            }
        })
}

pub fn spawn_reader(source: &str, tx: Sender<Event>) -> Result<JoinHandle<()>> {
    let reader = open(source)?;
    Ok(thread::spawn(move || {
        for detection in detections(reader) {
            if tx.send(Event::Detection(detection)).is_err() {
                break;
            }
        }
        debug!("Landmark stream ended");
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_blank_and_malformed_lines() {
        let input = concat!(
            r#"{"faces": [[{"x": 0.1, "y": 0.2, "z": 0.0}]]}"#,
            "\n\n",
            "garbage\n",
            r#"{"faces": []}"#,
            "\n",
        );

        let parsed: Vec<Detection> = detections(Cursor::new(input)).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].faces.len(), 1);
        assert!(parsed[1].faces.is_empty());
    }

    #[test]
    fn reader_forwards_events() -> Result<()> {
        let path = std::env::temp_dir()
            .join(format!("trinket-landmarks-{}.jsonl", std::process::id()));
        std::fs::write(&path, "{\"faces\": []}\n{\"faces\": []}\n")?;

        let (tx, rx) = flume::unbounded();
        spawn_reader(path.to_str().unwrap(), tx)?.join().unwrap();

        let events: Vec<Event> = rx.drain().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Detection(_)));

        std::fs::remove_file(path)?;
        Ok(())
    }
}
