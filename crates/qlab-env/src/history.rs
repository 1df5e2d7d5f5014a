/// Number of most recent episodes averaged by the success criterion.
pub const ROLLING_WINDOW: usize = 100;

/// Per-run record of finished episodes.
///
/// Turn counts are stored cumulatively, starting from a leading zero, so the
/// total over any trailing window is a single subtraction.
///
/// # Example
///
/// ```
/// use qlab_env::EpisodeHistory;
///
/// let mut history = EpisodeHistory::new();
/// history.push(10, 10.0);
/// history.push(15, 15.0);
/// assert_eq!(history.episodes(), 2);
/// assert_eq!(history.cumulative_turns(), &[0, 10, 25]);
/// assert_eq!(history.average_turns(), Some(12.5));
/// ```
#[derive(Debug, Clone)]
pub struct EpisodeHistory {
    cumulative_turns: Vec<usize>,
    rewards: Vec<f64>,
}

impl Default for EpisodeHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EpisodeHistory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cumulative_turns: vec![0],
            rewards: vec![],
        }
    }

    /// Records a finished episode.
    pub fn push(&mut self, turns: usize, reward_total: f64) {
        let last = self.cumulative_turns.last().copied().unwrap_or(0);
        self.cumulative_turns.push(last + turns);
        self.rewards.push(reward_total);
    }

    /// Forgets all episodes, as at the start of a new run.
    pub fn clear(&mut self) {
        self.cumulative_turns.truncate(1);
        self.rewards.clear();
    }

    #[must_use]
    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    #[must_use]
    pub fn cumulative_turns(&self) -> &[usize] {
        &self.cumulative_turns
    }

    /// Total reward collected in each finished episode.
    #[must_use]
    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Rolling average episode length, or `None` before the first episode.
    #[must_use]
    pub fn average_turns(&self) -> Option<f64> {
        rolling_average(&self.cumulative_turns)
    }
}

/// Average episode length over the last [`ROLLING_WINDOW`] episodes.
///
/// `cumulative` holds one more entry than there are episodes (the leading
/// entry is the total before the first episode). Once at least
/// [`ROLLING_WINDOW`] episodes exist, including exactly that many, the average
/// is taken over the trailing window; before that it is taken over all
/// episodes. Returns `None` when there is no episode.
///
/// ```
/// use qlab_env::rolling_average;
///
/// assert_eq!(rolling_average(&[0, 10, 25, 40]), Some(40.0 / 3.0));
/// assert_eq!(rolling_average(&[0]), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn rolling_average(cumulative: &[usize]) -> Option<f64> {
    let episodes = cumulative.len().checked_sub(1).filter(|&n| n > 0)?;
    let last = *cumulative.last()?;
    if episodes >= ROLLING_WINDOW {
        let first = cumulative[cumulative.len() - 1 - ROLLING_WINDOW];
        Some((last - first) as f64 / ROLLING_WINDOW as f64)
    } else {
        Some(last as f64 / episodes as f64)
    }
}
