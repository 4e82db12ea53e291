#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_chars: usize,
	pub overlap_chars: usize,
}

/// Offsets are character positions into the source text.
#[derive(Clone, Debug)]
pub struct Chunk {
	pub chunk_index: i32,
	pub start_offset: usize,
	pub end_offset: usize,
	pub text: String,
}

/// Splits `text` into windows of at most `max_chars` characters, each window
/// starting `max_chars - overlap_chars` after the previous one. Consecutive
/// chunks share the trailing `overlap_chars` characters so retrieval does not
/// sever semantic units at chunk boundaries, at the cost of storing the
/// overlap twice.
pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
	if text.is_empty() {
		return Vec::new();
	}
	if cfg.overlap_chars >= cfg.max_chars {
		tracing::error!(
			max_chars = cfg.max_chars,
			overlap_chars = cfg.overlap_chars,
			"Chunk overlap must be smaller than chunk size. Producing no chunks.",
		);

		return Vec::new();
	}

	// Byte index of every character boundary, plus the end of the text, so
	// windows can be sliced without landing inside a multi-byte character.
	let mut boundaries: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();

	boundaries.push(text.len());

	let char_count = boundaries.len() - 1;
	let stride = cfg.max_chars - cfg.overlap_chars;
	let mut chunks = Vec::new();
	let mut start = 0_usize;
	let mut chunk_index = 0_i32;

	while start < char_count {
		let end = (start + cfg.max_chars).min(char_count);

		chunks.push(Chunk {
			chunk_index,
			start_offset: start,
			end_offset: end,
			text: text[boundaries[start]..boundaries[end]].to_string(),
		});

		chunk_index += 1;
		start += stride;
	}

	chunks
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cfg(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
		ChunkingConfig { max_chars, overlap_chars }
	}

	#[test]
	fn short_text_is_a_single_chunk() {
		let chunks = split_text("hello", &cfg(10, 2));

		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].text, "hello");
		assert_eq!(chunks[0].chunk_index, 0);
	}

	#[test]
	fn empty_text_produces_no_chunks() {
		assert!(split_text("", &cfg(10, 2)).is_empty());
	}

	#[test]
	fn consecutive_chunks_overlap_exactly() {
		let text: String = ('a'..='z').cycle().take(100).collect();
		let chunks = split_text(&text, &cfg(30, 10));

		for pair in chunks.windows(2) {
			assert!(pair[0].text.len() <= 30);

			if pair[1].end_offset < 100 {
				let shared = pair[0].end_offset - pair[1].start_offset;

				assert_eq!(shared, 10);
			}
		}
	}

	#[test]
	fn chunk_count_is_length_over_stride_rounded_up() {
		for len in [1_usize, 99, 100, 101, 3_599, 3_600, 7_199, 7_200, 10_000] {
			let text: String = "x".repeat(len);
			let chunks = split_text(&text, &cfg(4_000, 400));
			let expected = len.div_ceil(3_600);

			assert_eq!(chunks.len(), expected, "len = {len}");
			assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 4_000));
		}
	}

	#[test]
	fn splits_on_character_boundaries() {
		let text = "é".repeat(50);
		let chunks = split_text(&text, &cfg(20, 5));

		for chunk in &chunks {
			assert!(chunk.text.chars().count() <= 20);
			assert!(chunk.text.chars().all(|c| c == 'é'));
		}
	}

	#[test]
	fn degenerate_overlap_produces_no_chunks() {
		assert!(split_text("abc", &cfg(2, 2)).is_empty());
	}
}
