// ordered-dither threshold maps, recursively composed from a small
// set of hand-tuned bases

use crate::error::Error;

#[cfg(test)]
#[path = "./bayer_test.rs"]
mod bayer_test;

/// rectangular threshold matrix with values 0..rows*cols
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    values: Vec<i32>,
    rows: i32,
}

impl Map {
    pub fn new(rows: i32, cols: i32) -> Self {
        Map {
            values: vec![0; (rows * cols) as usize],
            rows,
        }
    }

    pub fn from_values(values: Vec<i32>, rows: i32) -> Self {
        Map { values, rows }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn cols(&self) -> i32 {
        if self.values.is_empty() || self.rows == 0 {
            return 0;
        }
        self.values.len() as i32 / self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// threshold test: true selects the right color of a dither pair
    pub fn is_on(&self, x: i32, y: i32, mix_level: f32) -> bool {
        let threshold = ((1.0 - mix_level) * self.values.len() as f32 + 0.5) as i32;
        let idx = (x.rem_euclid(self.cols()) + y.rem_euclid(self.rows()) * self.cols()) as usize;
        self.values[idx] >= threshold
    }
}

fn predefined_values(rows: i32, cols: i32) -> Vec<i32> {
    if (rows == 2 && cols == 1) || (rows == 1 && cols == 2) {
        return vec![
            0, 1, //
        ];
    }

    if (rows == 3 && cols == 1) || (rows == 1 && cols == 3) {
        return vec![
            0, 2, 1, //
        ];
    }

    if (rows == 3 && cols == 2) || (rows == 2 && cols == 3) {
        return vec![
            0, 4, 2, //
            3, 1, 5, //
        ];
    }

    if rows == 2 && cols == rows {
        return vec![
            0, 2, //
            3, 1, //
        ];
    }

    if rows == 3 && cols == rows {
        return vec![
            0, 7, 3, //
            6, 5, 2, //
            4, 1, 8, //
        ];
    }

    Vec::new()
}

/// hand-tuned base maps; empty for unsupported shapes
pub fn get_predefined(rows: i32, cols: i32) -> Map {
    Map::from_values(predefined_values(rows, cols), rows)
}

/// largest predefined map whose shape divides (rows, cols)
pub fn get_largest_predefined_map(rows: i32, cols: i32) -> Map {
    let mut current = Map::default();

    for y in 1..=rows {
        for x in 1..=cols {
            if rows % y != 0 || cols % x != 0 {
                continue;
            }

            let candidate = get_predefined(y, x);

            if candidate.size() <= current.size() {
                continue;
            }

            current = candidate;
        }
    }

    current
}

/// build an arbitrary threshold map by recursive composition.
///
/// The base map tiles the output and scales the recursively generated
/// quotient map, which picks the offset per tile. Fails when no
/// predefined shape divides the request.
pub fn generate(rows: i32, cols: i32) -> Result<Map, Error> {
    let outer = get_largest_predefined_map(rows, cols);

    if outer.cols() == cols && outer.rows() == rows {
        return Ok(outer);
    }

    if outer.rows() <= 0 || outer.cols() <= 0 {
        return Err(Error::InvalidArgument(format!(
            "unsupported bayer map size {}x{}",
            rows, cols
        )));
    }

    let inner = generate(rows / outer.rows(), cols / outer.cols())?;
    let mut values = vec![0; (rows * cols) as usize];

    // the predefined base becomes the fine tiling, the recursive map
    // the coarse offsets
    let (inner, outer) = (outer, inner);

    for y in 0..rows {
        for x in 0..cols {
            let fine = inner.values[((y % inner.rows()) * inner.cols() + x % inner.cols()) as usize];
            let coarse = outer.values
                [(((y / inner.rows()) % outer.rows()) * outer.cols() + (x / inner.cols()) % outer.cols()) as usize];

            values[(y * cols + x) as usize] = fine * outer.size() as i32 + coarse;
        }
    }

    Ok(Map::from_values(values, rows))
}
