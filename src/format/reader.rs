//! Problem-file reader for the `SIZE`/`LINE_NUM`/`LINE#`/`VIA#` text format
//! shared by the ADC2015, ADC2016, and ADC2017 problem families. 2D files
//! omit the z coordinate and never carry `VIA#` lines; that's the only
//! syntactic difference between the three, so one reader handles all of
//! them and lets [`crate::graph::Format::guess`] sort out which family a
//! parsed [`Problem`] actually is.

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::dimensions::Dimension;
use crate::point::Point;
use crate::problem::Problem;
use crate::via::Via;

/// One rejected line: its 1-based source line number and what was wrong
/// with it. [`read_problem`] collects every error it can find across the
/// whole file rather than stopping at the first one, and never returns a
/// partially-built [`Problem`] alongside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

struct Patterns {
    size2d: Regex,
    size3d: Regex,
    line_num: Regex,
    line2d: Regex,
    line3d: Regex,
    via_name: Regex,
    via_pos: Regex,
}

impl Patterns {
    fn new() -> Self {
        Patterns {
            size2d: Regex::new(r"(?i)^SIZE +(\d+)X(\d+)$").unwrap(),
            size3d: Regex::new(r"(?i)^SIZE +(\d+)X(\d+)X(\d+)$").unwrap(),
            line_num: Regex::new(r"(?i)^LINE_NUM +(\d+)$").unwrap(),
            line2d: Regex::new(r"(?i)^LINE#(\d+) +\((\d+),(\d+)\)[- ]\((\d+),(\d+)\)$").unwrap(),
            line3d: Regex::new(r"(?i)^LINE#(\d+) +\((\d+),(\d+),(\d+)\)[- ]\((\d+),(\d+),(\d+)\)$").unwrap(),
            via_name: Regex::new(r"(?i)^VIA#([A-Za-z]+) +").unwrap(),
            via_pos: Regex::new(r"\((\d+),(\d+),(\d+)\)").unwrap(),
        }
    }
}

struct State {
    problem: Problem,
    dim: Option<Dimension>,
    size_lineno: usize,
    two_d: bool,
    line_num: Option<usize>,
    line_num_lineno: usize,
    net_lines: HashMap<usize, usize>,
    via_lines: HashMap<String, usize>,
    terminal_lines: HashMap<(Point, Point), usize>,
    errors: Vec<ParseError>,
}

fn terminal_key(start: Point, end: Point) -> (Point, Point) {
    if start <= end { (start, end) } else { (end, start) }
}

fn parse_coord(caps: &Captures, idx: usize) -> Option<i32> {
    caps.get(idx)?.as_str().parse().ok()
}

fn check_range(dim: Dimension, point: Point, lineno: usize, errors: &mut Vec<ParseError>) -> bool {
    if !(0..dim.width as i32).contains(&point.x) {
        errors.push(ParseError { line: lineno, message: format!("X({}) is out of range", point.x) });
        return false;
    }
    if !(0..dim.height as i32).contains(&point.y) {
        errors.push(ParseError { line: lineno, message: format!("Y({}) is out of range", point.y) });
        return false;
    }
    if !(0..dim.depth as i32).contains(&point.z) {
        errors.push(ParseError { line: lineno, message: format!("Z({}) is out of range", point.z + 1) });
        return false;
    }
    true
}

fn try_size(p: &Patterns, s: &mut State, lineno: usize, line: &str) -> bool {
    let (caps, is_2d) = if let Some(caps) = p.size3d.captures(line) {
        (caps, false)
    } else if let Some(caps) = p.size2d.captures(line) {
        (caps, true)
    } else {
        return false;
    };

    if s.dim.is_some() {
        s.errors.push(ParseError {
            line: lineno,
            message: format!("duplicated 'SIZE' line, previously defined at line {}", s.size_lineno),
        });
        return true;
    }

    let parsed: Option<(u16, u16, u16)> = (|| {
        let width = caps[1].parse().ok()?;
        let height = caps[2].parse().ok()?;
        let depth = if is_2d { 1 } else { caps[3].parse().ok()? };
        Some((width, height, depth))
    })();
    let Some((width, height, depth)) = parsed else {
        s.errors.push(ParseError { line: lineno, message: "malformed SIZE value".into() });
        return true;
    };

    let dim = Dimension::new(width, height, depth);
    s.dim = Some(dim);
    s.problem.dimension = dim;
    s.two_d = is_2d;
    s.size_lineno = lineno;
    true
}

fn try_line_num(p: &Patterns, s: &mut State, lineno: usize, line: &str) -> bool {
    let Some(caps) = p.line_num.captures(line) else { return false };

    if s.line_num.is_some() {
        s.errors.push(ParseError {
            line: lineno,
            message: format!("duplicated 'LINE_NUM' line, previously defined at line {}", s.line_num_lineno),
        });
        return true;
    }

    let Some(n) = caps[1].parse::<usize>().ok() else {
        s.errors.push(ParseError { line: lineno, message: "malformed LINE_NUM value".into() });
        return true;
    };
    s.line_num = Some(n);
    s.line_num_lineno = lineno;
    true
}

fn try_line(p: &Patterns, s: &mut State, lineno: usize, line: &str) -> bool {
    let caps = if s.two_d { p.line2d.captures(line) } else { p.line3d.captures(line) };
    let Some(caps) = caps else { return false };

    let Some(dim) = s.dim else {
        s.errors.push(ParseError { line: lineno, message: "missing 'SIZE' before 'LINE'".into() });
        return true;
    };
    let Some(line_num) = s.line_num else {
        s.errors.push(ParseError { line: lineno, message: "missing 'LINE_NUM' before 'LINE'".into() });
        return true;
    };

    let Some(net_id) = caps[1].parse::<usize>().ok() else {
        s.errors.push(ParseError { line: lineno, message: "malformed net number".into() });
        return true;
    };
    if !(1..=line_num).contains(&net_id) {
        s.errors.push(ParseError { line: lineno, message: format!("LINE#{net_id} is out of range") });
        return true;
    }
    if let Some(&prev) = s.net_lines.get(&net_id) {
        s.errors.push(ParseError {
            line: lineno,
            message: format!("duplicated LINE#{net_id}, previously defined at line {prev}"),
        });
        return true;
    }
    s.net_lines.insert(net_id, lineno);

    let parsed = (|| -> Option<(i32, i32, i32, i32, i32, i32)> {
        if s.two_d {
            let x0 = parse_coord(&caps, 2)?;
            let y0 = parse_coord(&caps, 3)?;
            let x1 = parse_coord(&caps, 4)?;
            let y1 = parse_coord(&caps, 5)?;
            Some((x0, y0, 0, x1, y1, 0))
        } else {
            let x0 = parse_coord(&caps, 2)?;
            let y0 = parse_coord(&caps, 3)?;
            let z0 = parse_coord(&caps, 4)?;
            let x1 = parse_coord(&caps, 5)?;
            let y1 = parse_coord(&caps, 6)?;
            let z1 = parse_coord(&caps, 7)?;
            // layer numbers are 1-based in the file.
            Some((x0, y0, z0 - 1, x1, y1, z1 - 1))
        }
    })();
    let Some((x0, y0, z0, x1, y1, z1)) = parsed else {
        s.errors.push(ParseError { line: lineno, message: "malformed coordinate".into() });
        return true;
    };

    let start = Point::new(x0, y0, z0);
    if !check_range(dim, start, lineno, &mut s.errors) {
        return true;
    }
    let end = Point::new(x1, y1, z1);
    if !check_range(dim, end, lineno, &mut s.errors) {
        return true;
    }

    let key = terminal_key(start, end);
    if let Some(&prev) = s.terminal_lines.get(&key) {
        s.errors.push(ParseError {
            line: lineno,
            message: format!("LINE#{net_id} duplicated, terminal collision with the net defined at line {prev}"),
        });
        return true;
    }
    s.terminal_lines.insert(key, lineno);

    s.problem.add_net(net_id.to_string(), start, end);
    true
}

fn try_via(p: &Patterns, s: &mut State, lineno: usize, line: &str) -> bool {
    let Some(caps) = p.via_name.captures(line) else { return false };

    let Some(dim) = s.dim else {
        s.errors.push(ParseError { line: lineno, message: "missing 'SIZE' before 'VIA'".into() });
        return true;
    };

    let label = caps[1].to_string();
    if let Some(&prev) = s.via_lines.get(&label) {
        s.errors.push(ParseError {
            line: lineno,
            message: format!("duplicated VIA#{label}, previously defined at line {prev}"),
        });
        return true;
    }
    s.via_lines.insert(label.clone(), lineno);

    let mut anchor: Option<(i32, i32)> = None;
    let mut zs: Vec<i32> = Vec::new();
    for pos in p.via_pos.captures_iter(line) {
        let (Some(x), Some(y), Some(z_raw)) =
            (parse_coord(&pos, 1), parse_coord(&pos, 2), parse_coord(&pos, 3))
        else {
            s.errors.push(ParseError { line: lineno, message: "malformed via coordinate".into() });
            return true;
        };
        let z = z_raw - 1;
        if !check_range(dim, Point::new(x, y, z), lineno, &mut s.errors) {
            return true;
        }
        match anchor {
            None => anchor = Some((x, y)),
            Some((ax, ay)) => {
                if x != ax {
                    s.errors.push(ParseError {
                        line: lineno,
                        message: format!("X({x}) is different from the first point's X({ax})"),
                    });
                    return true;
                }
                if y != ay {
                    s.errors.push(ParseError {
                        line: lineno,
                        message: format!("Y({y}) is different from the first point's Y({ay})"),
                    });
                    return true;
                }
            }
        }
        zs.push(z);
    }

    let Some((x0, y0)) = anchor else {
        s.errors.push(ParseError { line: lineno, message: "via has no layer positions".into() });
        return true;
    };
    zs.sort_unstable();
    let z1 = *zs.first().unwrap();
    let z2 = *zs.last().unwrap();
    if (z2 - z1) as usize != zs.len() - 1 {
        s.errors.push(ParseError { line: lineno, message: "some layers are missing".into() });
        return true;
    }

    s.problem.add_via(Via::new(label, x0 as u16, y0 as u16, z1 as u16, z2 as u16));
    true
}

/// Parses the whole text of a problem file. On success every `LINE#` net
/// and `VIA#` via was in range, non-duplicated, and well-ordered with
/// respect to `SIZE`/`LINE_NUM`. On failure, every offending line is
/// reported — parsing never stops at the first error — and no partial
/// [`Problem`] is returned.
pub fn read_problem(text: &str) -> Result<Problem, Vec<ParseError>> {
    let patterns = Patterns::new();
    let mut state = State {
        problem: Problem::new(Dimension::new(0, 0, 0)),
        dim: None,
        size_lineno: 0,
        two_d: false,
        line_num: None,
        line_num_lineno: 0,
        net_lines: HashMap::new(),
        via_lines: HashMap::new(),
        terminal_lines: HashMap::new(),
        errors: Vec::new(),
    };

    for (i, raw_line) in text.lines().enumerate() {
        let lineno = i + 1;
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }

        if try_size(&patterns, &mut state, lineno, line) {
            continue;
        }
        if try_line_num(&patterns, &mut state, lineno, line) {
            continue;
        }
        if try_line(&patterns, &mut state, lineno, line) {
            continue;
        }
        if try_via(&patterns, &mut state, lineno, line) {
            continue;
        }
        state.errors.push(ParseError { line: lineno, message: "syntax error".to_string() });
    }

    if state.errors.is_empty() { Ok(state.problem) } else { Err(state.errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_2d_problem() {
        let text = "SIZE 3X3\nLINE_NUM 1\nLINE#1 (0,0)-(2,2)\n";
        let problem = read_problem(text).expect("well-formed problem");
        assert_eq!(problem.dimension, Dimension::planar(3, 3));
        assert_eq!(problem.net_count(), 1);
        let net = &problem.nets()[0];
        assert_eq!((net.start, net.end), (Point::new(0, 0, 0), Point::new(2, 2, 0)));
    }

    #[test]
    fn parses_a_3d_problem_with_a_via() {
        let text = "SIZE 2X2X2\nLINE_NUM 1\nLINE#1 (0,0,1)-(0,0,2)\nVIA#A (1,1,1)-(1,1,2)\n";
        let problem = read_problem(text).expect("well-formed problem");
        assert_eq!(problem.dimension, Dimension::new(2, 2, 2));
        assert_eq!(problem.via_count(), 1);
        let via = &problem.vias()[0];
        assert_eq!((via.x, via.y, via.z1, via.z2), (1, 1, 0, 1));
    }

    #[test]
    fn rejects_duplicate_net_number_but_keeps_reading() {
        let text = "SIZE 3X3\nLINE_NUM 2\nLINE#1 (0,0)-(1,1)\nLINE#1 (2,2)-(0,2)\nLINE#2 (0,1)-(2,1)\n";
        let errors = read_problem(text).expect_err("duplicate LINE# should fail the parse");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 4);
    }

    #[test]
    fn rejects_out_of_range_coordinate() {
        let text = "SIZE 2X2\nLINE_NUM 1\nLINE#1 (0,0)-(5,5)\n";
        let errors = read_problem(text).expect_err("out-of-range coordinate should fail the parse");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("out of range"));
    }

    #[test]
    fn rejects_non_contiguous_via_layers() {
        let text = "SIZE 2X2X3\nLINE_NUM 1\nLINE#1 (0,0,1)-(0,0,3)\nVIA#A (1,1,1)-(1,1,3)\n";
        let errors = read_problem(text).expect_err("gap in via layers should fail the parse");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing"));
    }

    #[test]
    fn rejects_two_nets_with_identical_terminals() {
        // spec scenario S3: distinct LINE# ids sharing both terminal
        // coordinates must be rejected at parse time, before the pipeline
        // ever sees a Problem.
        let text = "SIZE 2X1\nLINE_NUM 2\nLINE#1 (0,0)-(1,0)\nLINE#2 (0,0)-(1,0)\n";
        let errors = read_problem(text).expect_err("duplicate terminals should fail the parse");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 4);
        assert!(errors[0].message.contains("duplicated"));
    }

    #[test]
    fn line_before_size_is_rejected() {
        let text = "LINE_NUM 1\nLINE#1 (0,0)-(1,1)\n";
        let errors = read_problem(text).expect_err("missing SIZE should fail the parse");
        assert!(errors.iter().any(|e| e.message.contains("Missing 'SIZE'") || e.message.contains("missing 'SIZE'")));
    }
}
