use std::io::Read;
use std::path::Path;

use color_eyre::{Result, eyre::Context};

const ARTIST: &str = "Audio Track Artist";
const TITLE: &str = "Title";
const ALBUM_YEAR: &str = "Album Year";
const AUDIO_CODEC: &str = "Media Audio Codec";
const FILE_PATH: &str = "Part File Combined";

/// One record of a Plex playlist export. Columns are matched by header name,
/// so their order in the file does not matter and unknown ones are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRow {
    pub artist: String,
    pub title: String,
    pub album_year: String,
    pub audio_codec: String,
    pub file_path: String,
}

/// Positions of the consumed columns in the header record.
#[derive(Debug, Default)]
struct ColumnIndex {
    artist: Option<usize>,
    title: Option<usize>,
    album_year: Option<usize>,
    audio_codec: Option<usize>,
    file_path: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let position = |name: &str| headers.iter().position(|header| header == name);
        Self {
            artist: position(ARTIST),
            title: position(TITLE),
            album_year: position(ALBUM_YEAR),
            audio_codec: position(AUDIO_CODEC),
            file_path: position(FILE_PATH),
        }
    }

    /// Missing columns and fields past the end of a short record read as empty.
    fn row(&self, record: &csv::StringRecord) -> TrackRow {
        let field = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        TrackRow {
            artist: field(self.artist),
            title: field(self.title),
            album_year: field(self.album_year),
            audio_codec: field(self.audio_codec),
            file_path: field(self.file_path),
        }
    }
}

/// Read every row of a pipe-delimited export into memory.
pub fn read_rows(path: &Path) -> Result<Vec<TrackRow>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("Failed to open playlist export: {}", path.display()))?;
    parse_rows(file).wrap_err_with(|| format!("Failed to parse playlist export: {}", path.display()))
}

pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<TrackRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = ColumnIndex::from_headers(
        csv_reader
            .headers()
            .wrap_err("Failed to read header record")?,
    );
    if columns.file_path.is_none() {
        tracing::warn!("Export has no `{}` column; every row will be skipped", FILE_PATH);
    }

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        // +2: one for the header, one for 1-based numbering
        let record = record.wrap_err_with(|| format!("Invalid record on line {}", index + 2))?;
        rows.push(columns.row(&record));
    }

    tracing::debug!("Read {} rows from playlist export", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_by_header_name() {
        let data = "\
Title|Part File Combined|Audio Track Artist|Album Year|Media Audio Codec|Rating
Song A|/music/a.flac|Artist A|1999|flac|5
Song B|/music/b.mp3|Artist B||mp3|
";
        let rows = parse_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            TrackRow {
                artist: "Artist A".to_string(),
                title: "Song A".to_string(),
                album_year: "1999".to_string(),
                audio_codec: "flac".to_string(),
                file_path: "/music/a.flac".to_string(),
            }
        );
        assert_eq!(rows[1].album_year, "");
        assert_eq!(rows[1].file_path, "/music/b.mp3");
    }

    #[test]
    fn test_missing_columns_read_as_empty() {
        let data = "Title|Part File Combined\nOnly Title|/music/x.flac\n";
        let rows = parse_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].artist, "");
        assert_eq!(rows[0].title, "Only Title");
    }

    #[test]
    fn test_commas_are_not_delimiters() {
        let data = "Audio Track Artist|Title|Part File Combined\nEarth, Wind & Fire|September|/music/s.flac\n";
        let rows = parse_rows(data.as_bytes()).unwrap();

        assert_eq!(rows[0].artist, "Earth, Wind & Fire");
    }

    #[test]
    fn test_short_records_are_accepted() {
        let data = "Audio Track Artist|Title|Part File Combined\nArtist|Title\n";
        let rows = parse_rows(data.as_bytes()).unwrap();

        assert_eq!(rows[0].title, "Title");
        assert_eq!(rows[0].file_path, "");
    }

    #[test]
    fn test_read_rows_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_rows(&dir.path().join("missing.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_short_record_keeps_later_rows() {
        let data = "\
Audio Track Artist|Title|Album Year|Media Audio Codec|Part File Combined
Artist A
Artist B|Song B|2001|flac|/music/b.flac
";
        let rows = parse_rows(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].artist, "Artist A");
        assert_eq!(rows[0].title, "");
        assert_eq!(rows[0].file_path, "");
        assert_eq!(rows[1].file_path, "/music/b.flac");
    }
}
