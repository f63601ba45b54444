/// Fewest and most inputs the composition grid supports
pub const MIN_INPUTS: usize = 2;
pub const MAX_INPUTS: usize = 12;

/// xstack layouts for 2..=12 inputs, indexed by `n - MIN_INPUTS`.
///
/// Each `x_y` entry places one input; `wK`/`hK` are the width/height of
/// input K. Offsets sum the inputs to the left and above, so the grid shape
/// differs per count (2 and 3 in one row, 4 as 2x2, and so on).
const LAYOUTS: [&str; MAX_INPUTS - MIN_INPUTS + 1] = [
    "0_0|w0_0",
    "0_0|w0_0|w0+w1_0",
    "0_0|w0_0|0_h0|w0_h0",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0|0_h0+h1",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0|0_h0+h1|w0_h0+h1",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0|0_h0+h1|w0_h0+h1|w0+w1_h0+h1",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0|0_h0+h1|w0_h0+h1|w0+w1_h0+h1|0_h0+h1+h2",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0|0_h0+h1|w0_h0+h1|w0+w1_h0+h1|0_h0+h1+h2|w0_h0+h1+h2",
    "0_0|w0_0|w0+w1_0|0_h0|w0_h0|w0+w1_h0|0_h0+h1|w0_h0+h1|w0+w1_h0+h1|0_h0+h1+h2|w0_h0+h1+h2|w0+w1_h0+h1+h2",
];

/// Layout string for `inputs` videos, if the table has one
pub fn layout_for(inputs: usize) -> Option<&'static str> {
    if !(MIN_INPUTS..=MAX_INPUTS).contains(&inputs) {
        return None;
    }
    Some(LAYOUTS[inputs - MIN_INPUTS])
}
