//! 回复分片：按字符数切分，平台单条消息有长度上限

/// 默认分片大小（字符），低于 Discord 的 2000 上限
pub const DEFAULT_CHUNK_SIZE: usize = 1750;

/// 按 Unicode 字符切成最多 `size` 个字符一段；拼接结果与原文完全一致，空串返回空 Vec
pub fn chunk_reply(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    text.chars()
        .collect::<Vec<_>>()
        .chunks(size)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_reply("Hi!", DEFAULT_CHUNK_SIZE), vec!["Hi!"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_reply("", DEFAULT_CHUNK_SIZE).is_empty());
    }

    #[test]
    fn test_exact_multiple() {
        let text = "a".repeat(DEFAULT_CHUNK_SIZE * 2);
        let chunks = chunk_reply(&text, DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == DEFAULT_CHUNK_SIZE));
    }

    #[test]
    fn test_ceil_count_and_concat() {
        let text: String = (0..4000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_reply(&text, DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 4000 - 2 * DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_multibyte_chars_not_split() {
        let text = "ツンデレ".repeat(500);
        let chunks = chunk_reply(&text, DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), DEFAULT_CHUNK_SIZE);
        assert_eq!(chunks.concat(), text);
    }
}
