//! Bench-file fixtures shared across the integration test scenarios.

/// The ISCAS-85 `c17` benchmark, unlocked (no key gates, empty correct key).
pub const C17: &str = "\
#
INPUT(1)
INPUT(2)
INPUT(3)
INPUT(6)
INPUT(7)
OUTPUT(22)
OUTPUT(23)
10 = nand(1, 3)
11 = nand(3, 6)
16 = nand(2, 11)
19 = nand(11, 7)
22 = nand(10, 16)
23 = nand(16, 19)
";

/// A straight-line chain of 9 non-input gates, deep enough for two disjoint
/// length-3 routes to exist.
pub const LONG_CHAIN: &str = "\
INPUT(a)
INPUT(b)
OUTPUT(g8)
g0 = and(a, b)
g1 = not(g0)
g2 = buf(g1)
g3 = not(g2)
g4 = buf(g3)
g5 = not(g4)
g6 = buf(g5)
g7 = not(g6)
g8 = buf(g7)
";
