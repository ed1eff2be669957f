use serde::{Deserialize, Serialize};

/// Named revisions of the EVM semantics, in activation order.
///
/// The fork selects which opcodes exist and which precompile addresses are
/// pre-warmed. The gas schedule itself is the canonical post-Berlin/London
/// schedule for every fork; historical repricings are not modelled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Fork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    #[default]
    Cancun,
    /// Forward placeholder: extends the precompile range, no new opcodes yet.
    Prague,
}
