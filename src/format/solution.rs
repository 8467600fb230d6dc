//! Solution-file writer (and a matching reader, used by this module's own
//! round-trip tests and available to callers diffing two solution files)
//! for the `SIZE`/`LAYER`-sectioned grid format every ADC family shares.

use regex::Regex;

use crate::decoder::Route;
use crate::dimensions::Dimension;
use crate::point::Point;

use super::reader::ParseError;

/// A solved grid: `val(point)` is `0` for an unvisited cell or `net_id + 1`
/// for a cell on that net's route.
#[derive(Debug, Clone)]
pub struct Solution {
    pub dimension: Dimension,
    grid: Vec<u32>,
}

impl Solution {
    pub fn val(&self, point: Point) -> u32 {
        self.dimension.xyz_to_index(point).map(|i| self.grid[i]).unwrap_or(0)
    }
}

/// Renders `routes` against `dim` into the layer-sectioned solution text:
/// a `SIZE` header, then one `LAYER n` section per z-layer holding `height`
/// comma-separated rows of `width` values apiece.
pub fn write_solution(dim: Dimension, routes: &[Route]) -> String {
    let mut grid = vec![0u32; dim.cell_count()];
    for route in routes {
        let val = route.net_id as u32 + 1;
        for &point in &route.points {
            if let Some(idx) = dim.xyz_to_index(point) {
                grid[idx] = val;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!("SIZE {}X{}X{}\n", dim.width, dim.height, dim.depth));
    for z in 0..dim.depth {
        out.push_str(&format!("LAYER {}\n", z + 1));
        for y in 0..dim.height {
            let mut line = String::new();
            for x in 0..dim.width {
                if x > 0 {
                    line.push(',');
                }
                let idx = dim
                    .xyz_to_index(Point::new(x as i32, y as i32, z as i32))
                    .expect("x,y,z within dim by construction");
                line.push_str(&format!("{:3}", grid[idx]));
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

struct Patterns {
    size: Regex,
    layer: Regex,
}

impl Patterns {
    fn new() -> Self {
        Patterns {
            size: Regex::new(r"(?i)^SIZE +(\d+)X(\d+)X(\d+)$").unwrap(),
            layer: Regex::new(r"(?i)^LAYER +(\d+)$").unwrap(),
        }
    }
}

struct State {
    dim: Option<Dimension>,
    cur_y: usize,
    cur_z: usize,
    grid: Vec<u32>,
    errors: Vec<ParseError>,
}

fn try_size(p: &Patterns, s: &mut State, lineno: usize, line: &str) -> bool {
    let Some(caps) = p.size.captures(line) else { return false };
    if s.dim.is_some() {
        s.errors.push(ParseError { line: lineno, message: "duplicated 'SIZE' line".into() });
        return true;
    }
    let parsed: Option<(u16, u16, u16)> = (|| {
        Some((caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?))
    })();
    let Some((width, height, depth)) = parsed else {
        s.errors.push(ParseError { line: lineno, message: "malformed SIZE value".into() });
        return true;
    };
    let dim = Dimension::new(width, height, depth);
    s.dim = Some(dim);
    s.grid = vec![0; dim.cell_count()];
    s.cur_y = dim.height as usize;
    s.cur_z = 0;
    true
}

fn try_layer(p: &Patterns, s: &mut State, lineno: usize, line: &str) -> bool {
    let Some(caps) = p.layer.captures(line) else { return false };
    let Some(dim) = s.dim else {
        s.errors.push(ParseError { line: lineno, message: "'SIZE' does not exist".into() });
        return true;
    };
    if s.cur_y != dim.height as usize {
        s.errors.push(ParseError { line: lineno, message: "# of lines mismatch".into() });
        return true;
    }
    let Some(lay) = caps[1].parse::<usize>().ok() else {
        s.errors.push(ParseError { line: lineno, message: "malformed LAYER value".into() });
        return true;
    };
    let expected = s.cur_z + 1;
    if lay != expected {
        s.errors.push(ParseError { line: lineno, message: format!("illegal LAYER id {lay}, {expected} expected") });
        return true;
    }
    s.cur_y = 0;
    true
}

/// Parses solution text written by [`write_solution`] (or an equivalent
/// tool's output). Collects every error across the file; returns no
/// partial [`Solution`] on failure.
pub fn read_solution(text: &str) -> Result<Solution, Vec<ParseError>> {
    let patterns = Patterns::new();
    let mut state = State { dim: None, cur_y: 0, cur_z: 0, grid: Vec::new(), errors: Vec::new() };

    for (i, raw_line) in text.lines().enumerate() {
        let lineno = i + 1;
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }
        if try_size(&patterns, &mut state, lineno, line) {
            continue;
        }
        if try_layer(&patterns, &mut state, lineno, line) {
            continue;
        }

        let Some(dim) = state.dim else {
            state.errors.push(ParseError { line: lineno, message: "'SIZE' does not exist".into() });
            continue;
        };
        if state.cur_y == dim.height as usize {
            state.errors.push(ParseError { line: lineno, message: "# of lines mismatch".into() });
            continue;
        }
        let values: Vec<&str> = line.split(',').collect();
        if values.len() != dim.width as usize {
            state.errors.push(ParseError { line: lineno, message: "# of elements mismatch".into() });
            continue;
        }
        let mut row_ok = true;
        for (x, raw_val) in values.iter().enumerate() {
            let Some(val) = raw_val.trim().parse::<u32>().ok() else {
                state.errors.push(ParseError { line: lineno, message: format!("malformed value '{raw_val}'") });
                row_ok = false;
                break;
            };
            let idx = dim
                .xyz_to_index(Point::new(x as i32, state.cur_y as i32, state.cur_z as i32))
                .expect("x,y,z within dim by construction");
            state.grid[idx] = val;
        }
        if row_ok {
            state.cur_y += 1;
            if state.cur_y == dim.height as usize {
                state.cur_z += 1;
            }
        }
    }

    if state.errors.is_empty() {
        Ok(Solution { dimension: state.dim.unwrap_or(Dimension::new(0, 0, 0)), grid: state.grid })
    } else {
        Err(state.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_a_single_route() {
        let dim = Dimension::planar(3, 1);
        let routes = vec![Route { net_id: 0, points: vec![Point::new(0, 0, 0), Point::new(1, 0, 0), Point::new(2, 0, 0)] }];
        let text = write_solution(dim, &routes);
        let solution = read_solution(&text).expect("well-formed solution text");
        assert_eq!(solution.dimension, dim);
        assert_eq!(solution.val(Point::new(0, 0, 0)), 1);
        assert_eq!(solution.val(Point::new(1, 0, 0)), 1);
        assert_eq!(solution.val(Point::new(2, 0, 0)), 1);
    }

    #[test]
    fn unvisited_cells_are_zero() {
        let dim = Dimension::planar(2, 2);
        let text = write_solution(dim, &[]);
        let solution = read_solution(&text).expect("well-formed solution text");
        assert_eq!(solution.val(Point::new(0, 0, 0)), 0);
    }

    #[test]
    fn wrong_row_width_is_rejected() {
        let text = "SIZE 2X1X1\nLAYER 1\n0,0,0\n";
        let errors = read_solution(text).expect_err("row with too many columns should fail");
        assert!(errors[0].message.contains("elements mismatch"));
    }
}
