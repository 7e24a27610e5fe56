/// Greedy word packing: a word joins the current chunk while
/// `current + " " + word` stays within `max_chars` characters.
///
/// A single word longer than the limit is cut into `max_chars` pieces so
/// that no chunk ever exceeds the provider ceiling.
pub fn split_text_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let candidate = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if candidate <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = candidate;
        } else {
            chunks.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text_into_chunks("hello world", 200), vec!["hello world"]);
        assert!(split_text_into_chunks("   ", 200).is_empty());
    }

    #[test]
    fn packs_words_greedily() {
        let chunks = split_text_into_chunks("aaa bbb ccc ddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);

        let chunks = split_text_into_chunks("aaa bbb ccc", 8);
        assert_eq!(chunks, vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn chunks_respect_limit_and_keep_words() {
        let text = "The quick brown fox jumps over the lazy dog ".repeat(20);
        let chunks = split_text_into_chunks(&text, 200);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
        assert_eq!(chunks.join(" "), text.trim());
    }

    #[test]
    fn overlong_word_is_cut() {
        let chunks = split_text_into_chunks("ab abcdefghij cd", 4);
        assert_eq!(chunks, vec!["ab", "abcd", "efgh", "ij", "cd"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = split_text_into_chunks("привет мир", 10);
        assert_eq!(chunks, vec!["привет мир"]);
    }
}
