/// Key layout for the store's Fjall partitions
///
/// Partition structure:
/// - `characters`: character:{id} -> Character (JSON)
/// - `tombstones`: tombstone:{id} -> CharacterTombstone (JSON)
/// - `titles`: title:{text} -> CharacterTitle (JSON)

pub const CHARACTERS: &str = "characters";
pub const TOMBSTONES: &str = "tombstones";
pub const TITLES: &str = "titles";

/// Encode a character key: character:{id}
pub fn encode_character_key(id: i64) -> Vec<u8> {
    format!("character:{}", id).into_bytes()
}

/// Encode a tombstone key: tombstone:{id}
pub fn encode_tombstone_key(id: i64) -> Vec<u8> {
    format!("tombstone:{}", id).into_bytes()
}

/// Encode a title key: title:{text}
pub fn encode_title_key(title: &str) -> Vec<u8> {
    format!("title:{}", title).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_key_encoding() {
        let key = encode_character_key(7248246);
        assert_eq!(key, b"character:7248246");
    }

    #[test]
    fn test_tombstone_and_title_keys() {
        assert_eq!(encode_tombstone_key(7), b"tombstone:7");
        assert_eq!(encode_title_key("The Final Witness"), b"title:The Final Witness");
    }
}
