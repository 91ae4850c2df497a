use serde::{Deserialize, Serialize};

/// Which diagonal pair of squares is on screen.
///
/// Also used as the counterbalanced starting orientation of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuartetPair {
    LeftTilted,
    RightTilted,
}

impl QuartetPair {
    pub const ALL: [QuartetPair; 2] = [QuartetPair::LeftTilted, QuartetPair::RightTilted];

    pub fn toggled(self) -> Self {
        match self {
            Self::LeftTilted => Self::RightTilted,
            Self::RightTilted => Self::LeftTilted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftTilted => "left_tilted",
            Self::RightTilted => "right_tilted",
        }
    }

    /// Centres of the two squares, mirrored through the origin.
    ///
    /// Left-tilted: (-h, +v) and (+h, -v). Right-tilted: (+h, +v) and (-h, -v).
    /// Units follow the offsets (degrees of visual angle upstream, y up).
    pub fn square_centres(&self, hori: f64, verti: f64) -> [(f64, f64); 2] {
        match self {
            Self::LeftTilted => [(-hori, verti), (hori, -verti)],
            Self::RightTilted => [(hori, verti), (-hori, -verti)],
        }
    }
}

/// Horizontal and vertical offsets of a square on a circle of `radius`
/// for the given aspect ratio.
pub fn ratio_to_offsets(ratio: f64, radius: f64) -> (f64, f64) {
    let angle = ratio.atan();
    (radius * angle.cos(), radius * angle.sin())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixationColor {
    Red,
    Green,
}

impl FixationColor {
    pub fn rgba(&self) -> [u8; 4] {
        match self {
            Self::Red => [255, 0, 0, 255],
            Self::Green => [0, 128, 0, 255],
        }
    }
}

/// One displayable quartet configuration: the renderer draws the two squares
/// of `pair` at `(±hori, ±verti)` and the fixation dot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuartetFrame {
    pub pair: QuartetPair,
    pub hori: f64,
    pub verti: f64,
    pub fixation: FixationColor,
}

impl QuartetFrame {
    pub fn at_ratio(pair: QuartetPair, ratio: f64, radius: f64) -> Self {
        let (hori, verti) = ratio_to_offsets(ratio, radius);
        Self {
            pair,
            hori,
            verti,
            fixation: FixationColor::Red,
        }
    }
}

/// Fixed instruction screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    Trigger,
    LimitsInstructions,
    PracticeInstructions,
    EndOfPractice,
    Bridge,
    ConstantInstructions,
    NoResponse,
    Closing,
}

impl Message {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Trigger => "Experiment will start soon. Press p to continue.",
            Self::LimitsInstructions => {
                "Please keep your eyes on the red dot at all times.\n\n\
                 Press the space bar as soon as you notice\n\n\
                 a change in the perceived direction."
            }
            Self::PracticeInstructions => "Press any key to begin the practice trials.",
            Self::EndOfPractice => {
                "Great job!\nWhen you're ready, press the space bar to begin the experiment."
            }
            Self::Bridge => {
                "You've finished phase 1! Now, move on to phase 2.\n\nPress any key to proceed."
            }
            Self::ConstantInstructions => {
                "Please keep your eyes on the red dot at all times.\n\n\
                 Once the presentation ends,\n\n\
                 press V or H key to report the direction you perceived."
            }
            Self::NoResponse => "No response detected.\n\nPlease stay focused for the next trial.",
            Self::Closing => "You're all set! Thank you for your participation.",
        }
    }
}

/// Everything the renderer may be asked to draw for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    Blank,
    Message(Message),
    Break { runs_left: usize },
    Quartet(QuartetFrame),
    ReportPrompt,
    Fixation(FixationColor),
    /// Green dot after a trial, with the no-response message when nothing
    /// was recorded. Practice shows one or the other, never both.
    Feedback { responded: bool, practice: bool },
}

impl Screen {
    pub fn break_text(runs_left: usize) -> String {
        format!("{runs_left} run(s) to go!\n\nPlease take a short break and press any key to continue.")
    }
}
