//! Token containers produced by the vision encoder and the reducer.

/// One token vector in the encoder's embedding space.
pub type TokenVector = Vec<f32>;

/// Ordered token vectors produced for a single frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameTokenSet {
    tokens: Vec<TokenVector>,
}

impl FrameTokenSet {
    pub fn new(tokens: Vec<TokenVector>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[TokenVector] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<TokenVector> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Width of the first token vector, 0 for an empty set.
    pub fn token_dim(&self) -> usize {
        self.tokens.first().map_or(0, Vec::len)
    }

    /// Element-wise mean over all token vectors.
    ///
    /// Ragged vectors contribute to the positions they cover.
    pub fn pooled(&self) -> Vec<f32> {
        let dim = self.tokens.iter().map(Vec::len).max().unwrap_or(0);
        let mut sum = vec![0.0f64; dim];
        for token in &self.tokens {
            for (acc, &v) in sum.iter_mut().zip(token) {
                *acc += v as f64;
            }
        }
        let n = self.tokens.len().max(1) as f64;
        sum.into_iter().map(|v| (v / n) as f32).collect()
    }
}

/// Kept frame token sets concatenated in frame order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReducedTokenSequence {
    tokens: Vec<TokenVector>,
    kept_frames: Vec<usize>,
    tokens_per_frame: Vec<usize>,
}

impl ReducedTokenSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the tokens of input frame `frame_index`.
    pub fn push(&mut self, frame_index: usize, set: FrameTokenSet) {
        self.kept_frames.push(frame_index);
        self.tokens_per_frame.push(set.len());
        self.tokens.extend(set.into_tokens());
    }

    /// All kept tokens, in frame order.
    pub fn tokens(&self) -> &[TokenVector] {
        &self.tokens
    }

    /// Input indices of the frames whose tokens were kept.
    pub fn kept_frames(&self) -> &[usize] {
        &self.kept_frames
    }

    /// Token count contributed by each kept frame.
    pub fn tokens_per_frame(&self) -> &[usize] {
        &self.tokens_per_frame
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token_dim(&self) -> usize {
        self.tokens.first().map_or(0, Vec::len)
    }
}

impl FromIterator<(usize, FrameTokenSet)> for ReducedTokenSequence {
    fn from_iter<I: IntoIterator<Item = (usize, FrameTokenSet)>>(iter: I) -> Self {
        let mut sequence = Self::new();
        for (index, set) in iter {
            sequence.push(index, set);
        }
        sequence
    }
}
