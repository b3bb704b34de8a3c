use std::path::Path;

use crate::config::TranscodeConfig;
use crate::playlist::TrackRow;

const TRANSCODE_EXTENSION: &str = "mp3";

/// Sanitize filename for filesystem (replace invalid characters)
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// The `[codec]` part of a file name: the preset label when transcoding,
/// otherwise whatever codec the export reports.
pub fn codec_label(row: &TrackRow, transcode: &TranscodeConfig) -> String {
    if transcode.enabled {
        transcode.preset.codec_label()
    } else {
        row.audio_codec.trim().to_string()
    }
}

/// `Artist - Title (Year) [Codec]`, sanitized. `None` when artist or title is
/// missing, in which case the source file keeps its own name.
pub fn format_file_stem(row: &TrackRow, codec: &str) -> Option<String> {
    let artist = row.artist.trim();
    let title = row.title.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    let year = row.album_year.trim();

    Some(sanitize_filename(&format!(
        "{artist} - {title} ({year}) [{codec}]"
    )))
}

/// File name for the output of `source`. Copies keep the source extension,
/// transcodes always end in `.mp3`.
pub fn target_file_name(row: &TrackRow, source: &Path, transcode: &TranscodeConfig) -> String {
    let codec = codec_label(row, transcode);
    match format_file_stem(row, &codec) {
        Some(stem) => {
            let extension = if transcode.enabled {
                Some(TRANSCODE_EXTENSION.into())
            } else {
                source.extension().map(|e| e.to_string_lossy())
            };
            match extension {
                Some(extension) => format!("{stem}.{extension}"),
                None => stem,
            }
        }
        None => {
            let base_name = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| sanitize_filename(&source.to_string_lossy()));
            if transcode.enabled {
                Path::new(&base_name)
                    .with_extension(TRANSCODE_EXTENSION)
                    .to_string_lossy()
                    .into_owned()
            } else {
                base_name
            }
        }
    }
}
