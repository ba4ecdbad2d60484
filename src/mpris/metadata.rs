//! Track metadata as reported by MPRIS players.

use std::collections::HashMap;

use zvariant::{OwnedValue, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Track length in seconds.
    pub length: Option<f64>,
    pub spotify_id: Option<String>,
}

impl TrackMetadata {
    /// Stable identifier for the track: the Spotify id when known, otherwise
    /// artist, title and album joined.
    pub fn track_id(&self) -> String {
        match &self.spotify_id {
            Some(id) => id.clone(),
            None => format!("{}|{}|{}", self.artist, self.title, self.album),
        }
    }
}

fn string_of(v: &OwnedValue) -> Option<String> {
    String::try_from(v.clone()).ok()
}

/// Artist and album are string arrays per MPRIS, but some players send one string.
fn first_string(v: &OwnedValue) -> Option<String> {
    Vec::<String>::try_from(v.clone())
        .ok()
        .and_then(|v| v.into_iter().next())
        .or_else(|| string_of(v))
}

fn micros_of(v: &OwnedValue) -> Option<i64> {
    i64::try_from(v.clone())
        .ok()
        .or_else(|| u64::try_from(v.clone()).ok().map(|u| u as i64))
}

/// Pull the Spotify id out of an `mpris:trackid` object path or URI.
pub fn spotify_id_from_trackid(trackid: &str) -> Option<String> {
    if let Some(idx) = trackid.find("spotify:track:") {
        let candidate = &trackid[idx + "spotify:track:".len()..];
        if !candidate.is_empty() {
            return Some(candidate.to_string());
        }
    }
    if !trackid.contains("spotify") {
        return None;
    }
    trackid
        .rsplit('/')
        .next()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Parse a player's `Metadata` a{sv} map.
pub fn extract_metadata(map: &HashMap<String, OwnedValue>) -> TrackMetadata {
    let title = map.get("xesam:title").and_then(string_of).unwrap_or_default();
    let artist = map.get("xesam:artist").and_then(first_string).unwrap_or_default();
    let album = map.get("xesam:album").and_then(first_string).unwrap_or_default();
    let length = map
        .get("mpris:length")
        .and_then(micros_of)
        .map(|i| i as f64 / 1_000_000.0);
    let spotify_id = map
        .get("mpris:trackid")
        .and_then(|v| match &**v {
            Value::ObjectPath(p) => Some(p.to_string()),
            Value::Str(s) => Some(s.to_string()),
            _ => None,
        })
        .and_then(|s| spotify_id_from_trackid(&s));
    TrackMetadata {
        title,
        artist,
        album,
        length,
        spotify_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(v: Value<'_>) -> OwnedValue {
        OwnedValue::try_from(v).unwrap()
    }

    #[test]
    fn spotify_ids_from_paths_and_uris() {
        assert_eq!(
            spotify_id_from_trackid("/com/spotify/track/4uLU6hMCjMI75M1A2tKUQC").as_deref(),
            Some("4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(
            spotify_id_from_trackid("spotify:track:4uLU6hMCjMI75M1A2tKUQC").as_deref(),
            Some("4uLU6hMCjMI75M1A2tKUQC")
        );
        assert_eq!(spotify_id_from_trackid("/org/mpris/MediaPlayer2/Track/12"), None);
        assert_eq!(spotify_id_from_trackid("/com/spotify/track/"), None);
    }

    #[test]
    fn track_id_falls_back_to_tags() {
        let meta = TrackMetadata {
            title: "Song".into(),
            artist: "Band".into(),
            album: "LP".into(),
            ..Default::default()
        };
        assert_eq!(meta.track_id(), "Band|Song|LP");

        let spotify = TrackMetadata {
            spotify_id: Some("abc".into()),
            ..meta
        };
        assert_eq!(spotify.track_id(), "abc");
    }

    #[test]
    fn extracts_common_fields() {
        let mut map = HashMap::new();
        map.insert("xesam:title".to_string(), owned(Value::from("Song")));
        map.insert("xesam:artist".to_string(), owned(Value::from(vec!["Band".to_string()])));
        map.insert("xesam:album".to_string(), owned(Value::from("Single String Album")));
        map.insert("mpris:length".to_string(), owned(Value::from(215_000_000i64)));

        let meta = extract_metadata(&map);
        assert_eq!(meta.title, "Song");
        assert_eq!(meta.artist, "Band");
        assert_eq!(meta.album, "Single String Album");
        assert_eq!(meta.length, Some(215.0));
        assert_eq!(meta.spotify_id, None);
        assert_eq!(extract_metadata(&HashMap::new()), TrackMetadata::default());
    }
}
