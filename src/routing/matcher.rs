//! Channel matching between output and input ports
//!
//! Mono fans out to every channel on the other side; stereo channels only
//! connect to their own side. Ports with any other channel never connect.

use crate::models::{ChannelTag, Port};

/// Decide whether an output channel should feed an input channel
pub fn should_connect(output: ChannelTag, input: ChannelTag) -> bool {
    use ChannelTag::*;
    match (output, input) {
        (Other, _) | (_, Other) => false,
        (Mono, _) | (_, Mono) => true,
        (Left, Left) | (Right, Right) => true,
        _ => false,
    }
}

/// Every (output, input) pair that should be linked.
///
/// Returns `None` when either side has no ports, so callers can tell
/// "nothing to route" apart from "nothing matched".
pub fn match_ports(outputs: &[Port], inputs: &[Port]) -> Option<Vec<(Port, Port)>> {
    if outputs.is_empty() || inputs.is_empty() {
        return None;
    }

    let pairs = outputs
        .iter()
        .flat_map(|out| inputs.iter().map(move |inp| (out, inp)))
        .filter(|(out, inp)| should_connect(out.tag(), inp.tag()))
        .map(|(out, inp)| (out.clone(), inp.clone()))
        .collect();

    Some(pairs)
}
