//! On-screen ballot logic.
//!
//! Pressing a number yields the side effects the kiosk must perform, in
//! order, as [`BallotEvent`]s.  Sound effects, video playback and screen
//! changes are left to whoever consumes the events.

/// Candidate number printed on the ballot unless configured otherwise.
pub const DEFAULT_WINNING_NUMBER: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionResult {
    Win,
    Lose { selected: u32 },
}

pub fn evaluate_selection(selected: u32, winning_number: u32) -> SelectionResult {
    if selected == winning_number {
        SelectionResult::Win
    } else {
        SelectionResult::Lose { selected }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotEvent {
    PlayWin,
    PlayLose,
    /// Say this and wait for it to finish.
    Speak(String),
    NavigateToVideo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BallotState {
    pub show_lose_dialog: bool,
    pub lose_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Ballot {
    winning_number: u32,
    candidate: String,
    state: BallotState,
}

impl Ballot {
    pub fn new(winning_number: u32, candidate: impl Into<String>) -> Self {
        Self {
            winning_number,
            candidate: candidate.into(),
            state: BallotState::default(),
        }
    }

    pub fn state(&self) -> &BallotState {
        &self.state
    }

    pub fn winning_number(&self) -> u32 {
        self.winning_number
    }

    pub fn press(&mut self, selected: u32) -> Vec<BallotEvent> {
        match evaluate_selection(selected, self.winning_number) {
            SelectionResult::Win => vec![
                BallotEvent::PlayWin,
                BallotEvent::Speak(
                    "¡Excelente! Has elegido el número correcto. \
                     Reproduciendo el mensaje del candidato."
                        .to_string(),
                ),
                BallotEvent::NavigateToVideo,
            ],
            SelectionResult::Lose { selected } => {
                let winning = self.winning_number;
                let message = format!(
                    "¡Uy! Elegiste {selected}, pero el número correcto era el {winning}. \
                     Recuerda: marca el {winning}. ¡Vota por {}!",
                    self.candidate
                );
                self.state = BallotState {
                    show_lose_dialog: true,
                    lose_message: Some(message.clone()),
                };
                vec![BallotEvent::PlayLose, BallotEvent::Speak(message)]
            }
        }
    }

    /// Close the lose dialog; the last message is kept.
    pub fn dismiss_lose_dialog(&mut self) {
        self.state.show_lose_dialog = false;
    }

    /// Return to a blank ballot.
    pub fn staff_reset(&mut self) {
        self.state = BallotState::default();
    }
}
