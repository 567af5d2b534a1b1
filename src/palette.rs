use std::collections::HashMap;

use anstyle::RgbColor;

/// Kelly's colors of maximum contrast, minus white and black which do not
/// survive terminal backgrounds.
pub const PALETTE: [RgbColor; 20] = [
    RgbColor(243, 195, 0),   // vivid yellow
    RgbColor(135, 86, 146),  // strong purple
    RgbColor(243, 132, 0),   // vivid orange
    RgbColor(161, 202, 241), // vivid light blue
    RgbColor(190, 0, 50),    // vivid red
    RgbColor(194, 178, 128), // grayish yellow
    RgbColor(132, 132, 130), // medium gray
    RgbColor(0, 136, 86),    // strong green
    RgbColor(230, 143, 172), // strong purplish pink
    RgbColor(0, 103, 165),   // strong blue
    RgbColor(249, 147, 121), // vivid yellowish pink
    RgbColor(96, 78, 151),   // strong violet
    RgbColor(246, 166, 0),   // vivid orange yellow
    RgbColor(179, 68, 108),  // strong purplish red
    RgbColor(220, 211, 0),   // vivid greenish yellow
    RgbColor(136, 45, 23),   // strong reddish brown
    RgbColor(141, 182, 0),   // vivid yellow green
    RgbColor(101, 69, 34),   // deep yellowish brown
    RgbColor(226, 88, 34),   // vivid reddish orange
    RgbColor(43, 61, 38),    // dark olive green
];

/// Assigns palette indices to pod names. `initialize` walks the names in
/// sorted order so the same pod set gets the same colors across runs; pods
/// that appear later (rotation) take the next index, wrapping past the
/// palette end. An assignment never changes for the rest of the run.
#[derive(Debug, Default)]
pub struct ColorAssigner {
    assignments: HashMap<String, usize>,
    next_index: usize,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize<I, S>(&mut self, pod_names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignments.clear();
        self.next_index = 0;

        let mut names: Vec<String> = pod_names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();

        for name in names {
            self.assign(name);
        }
    }

    pub fn get(&mut self, pod_name: &str) -> RgbColor {
        let idx = match self.assignments.get(pod_name) {
            Some(idx) => *idx,
            None => self.assign(pod_name.to_string()),
        };
        PALETTE[idx]
    }

    fn assign(&mut self, pod_name: String) -> usize {
        let idx = self.next_index % PALETTE.len();
        self.assignments.entry(pod_name).or_insert(idx);
        self.next_index += 1;
        idx
    }
}
