use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/* ===================== Block Vocabulary ===================== */

/// The seven vehicle actions a learner can place in a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    MoveForwards,
    TurnLeft,
    TurnRight,
    TurnAround,
    Wait,
    Deliver,
    SoundHorn,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::MoveForwards,
        Action::TurnLeft,
        Action::TurnRight,
        Action::TurnAround,
        Action::Wait,
        Action::Deliver,
        Action::SoundHorn,
    ];

    /// Parse an editor block type tag.
    ///
    /// Both generations of the block vocabulary are accepted: the snake_case
    /// tags (`move_forwards`) and the camelCase tags (`moveForwards`).
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        let action = match tag {
            "move_forwards" | "moveForwards" => Action::MoveForwards,
            "turn_left" | "turnLeft" => Action::TurnLeft,
            "turn_right" | "turnRight" => Action::TurnRight,
            "turn_around" | "turnAround" => Action::TurnAround,
            "wait" => Action::Wait,
            "deliver" => Action::Deliver,
            "sound_horn" | "soundHorn" => Action::SoundHorn,
            _ => return None,
        };
        Some(action)
    }

    /// Canonical (snake_case) block type tag
    pub fn type_tag(self) -> &'static str {
        match self {
            Action::MoveForwards => "move_forwards",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::TurnAround => "turn_around",
            Action::Wait => "wait",
            Action::Deliver => "deliver",
            Action::SoundHorn => "sound_horn",
        }
    }
}

/// Semantic role of a block in the learner's chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    /// The fixed, non-removable root of the chain
    Start,
    Action(Action),
    /// Structural or decorative blocks (conditionals, sensors, ...)
    Unrecognized(String),
}

impl BlockKind {
    pub const START_TAG: &'static str = "start";

    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            // The start block was briefly named after the character it drives
            "start" | "van" => BlockKind::Start,
            _ => match Action::from_type_tag(tag) {
                Some(action) => BlockKind::Action(action),
                None => BlockKind::Unrecognized(tag.to_string()),
            },
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            BlockKind::Start => Self::START_TAG,
            BlockKind::Action(action) => action.type_tag(),
            BlockKind::Unrecognized(tag) => tag,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, BlockKind::Start)
    }
}

impl From<String> for BlockKind {
    fn from(tag: String) -> Self {
        BlockKind::from_type_tag(&tag)
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.type_tag().to_string()
    }
}

impl From<Action> for BlockKind {
    fn from(action: Action) -> Self {
        BlockKind::Action(action)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/* ===================== Commands ===================== */

/// A command delivered to the game/view layer
///
/// Serialized as `{"type": "moveForwards"}`, `{"type": "reset"}`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    MoveForwards,
    TurnLeft,
    TurnRight,
    TurnAround,
    Wait,
    Deliver,
    SoundHorn,
    /// Return the view to its initial state
    Reset,
}

impl Command {
    pub fn type_name(self) -> &'static str {
        match self {
            Command::MoveForwards => "moveForwards",
            Command::TurnLeft => "turnLeft",
            Command::TurnRight => "turnRight",
            Command::TurnAround => "turnAround",
            Command::Wait => "wait",
            Command::Deliver => "deliver",
            Command::SoundHorn => "soundHorn",
            Command::Reset => "reset",
        }
    }
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::MoveForwards => Command::MoveForwards,
            Action::TurnLeft => Command::TurnLeft,
            Action::TurnRight => Command::TurnRight,
            Action::TurnAround => Command::TurnAround,
            Action::Wait => Command::Wait,
            Action::Deliver => Command::Deliver,
            Action::SoundHorn => Command::SoundHorn,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/* ===================== Instructions ===================== */

/// Stable identifier of a block, used for highlighting
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionId(String);

impl InstructionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstructionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstructionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "instructionId")]
    pub id: InstructionId,
    pub command: Command,
}

impl Instruction {
    pub fn new(id: impl Into<InstructionId>, command: Command) -> Self {
        Self {
            id: id.into(),
            command,
        }
    }
}

/// Ordered instruction sequence compiled from one block chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program(Vec<Instruction>);

impl Program {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.0.iter()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }

    pub fn commands(&self) -> Vec<Command> {
        self.0.iter().map(|i| i.command).collect()
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self(instructions)
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/* ===================== Playback Speed ===================== */

/// Speed multipliers offered by the playback controls
pub const SPEED_OPTIONS: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Invalid playback speed {0}: must be a positive, finite multiplier")]
pub struct SpeedError(pub f64);

/// Playback-rate multiplier (always positive and finite)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Speed(f64);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);

    pub fn new(multiplier: f64) -> Result<Self, SpeedError> {
        if multiplier.is_finite() && multiplier > 0.0 {
            Ok(Self(multiplier))
        } else {
            Err(SpeedError(multiplier))
        }
    }

    pub fn multiplier(self) -> f64 {
        self.0
    }

    /// Period of one playback tick at this speed, never shorter than 1ns
    pub fn scale(self, base: Duration) -> Duration {
        let nanos = (base.as_nanos() as f64 / self.0).round().max(1.0);
        Duration::from_nanos(nanos as u64)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<f64> for Speed {
    type Error = SpeedError;

    fn try_from(multiplier: f64) -> Result<Self, Self::Error> {
        Speed::new(multiplier)
    }
}

impl<'de> Deserialize<'de> for Speed {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let multiplier = f64::deserialize(deserializer)?;
        Speed::new(multiplier).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}
