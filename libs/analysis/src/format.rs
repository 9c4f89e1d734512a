//! Line grammars for the benchmark log dialects.
//!
//! Each dialect is a small table of compiled patterns whose named capture
//! groups map onto record fields. The parsers are written once against these
//! tables; adding a dialect means adding a table, not another state machine.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

/// Dataset announcement shared by every dialect.
///
/// Captures: `name`, `base`, `query`, `dims`.
const DATASET_HEADER: &str = r"^(?P<name>.*?):\s*(?P<base>\d+)\s*base and (?P<query>\d+)\s*query vectors (?:loaded|created), dimensions (?P<dims>\d+)";

/// Haystack probe line. Captures: `k`, `budget`, `visited`.
const HAYSTACK_PROBE: &str =
    r"^Looking for top (?P<k>\d+) of (?P<budget>\d+) ordinals required visiting (?P<visited>\d+) nodes";

/// Build line of the haystack harness. Captures: `n`, `m`, `ef`, `secs`, `short`.
const HAYSTACK_BUILD: &str = r"^Build N=(?P<n>\d+) M=(?P<m>\d+) ef=(?P<ef>\d+) in (?P<secs>\S+)s with (?:avg degree \S+ and )?(?P<short>\S+) short edges";

/// Build line of the older haystack harness.
const HAYSTACK_LEGACY_BUILD: &str = r"^Build nVectors=(?P<n>\d+), M=(?P<m>\d+) ef=(?P<ef>\d+) in (?P<secs>\S+)s with (?P<short>\S+) short edges";

/// Product quantization announcement. Captures: `subspaces` when the codebook
/// count is printed bare, as in `ProductQuantization(16)`.
const BENCH_PRODUCT_QUANTIZATION: &str = r"ProductQuantization(?:\((?P<subspaces>\d+)\))?";
const BENCH_BINARY_QUANTIZATION: &str = r"BinaryQuantization";
const BENCH_UNCOMPRESSED: &str = r"Uncompressed";
const BENCH_GRAPH: &str = r"Build M=(?P<m>\d+) ef=(?P<ef>\d+)";

/// Query line of the grid benchmark. Captures: `location` (optional), `k`,
/// `overquery`, `recall`, `secs`, `visited` (optional).
const BENCH_QUERY: &str = r"^\s*Query (?:\((?P<location>memory|disk)\) ?)?top (?P<k>\d+)/(?P<overquery>\d+) recall (?P<recall>\d+(?:\.\d+)?) in (?P<secs>\d+(?:\.\d+)?)s(?: after (?P<visited>[\d,]+) nodes visited)?";

/// Query line of the older benchmark, which tags each result with the PQ flag.
const BENCH_LEGACY_QUERY: &str = r"^\s*Query PQ=(?P<pq>true|false) top (?P<k>\d+)/(?P<overquery>\d+) recall (?P<recall>\d+(?:\.\d+)?) in (?P<secs>\d+(?:\.\d+)?)s(?: after (?P<visited>[\d,]+) nodes visited)?";

/// Format tag for the haystack (nodes-visited) logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// `Build N=<n> M=<m> ef=<ef> in <t>s with <f> short edges`
    #[default]
    Haystack,
    /// `Build nVectors=<n>, M=<m> ef=<ef> in <t>s with <f> short edges`
    HaystackLegacy,
}

impl LogFormat {
    pub const ALL: [LogFormat; 2] = [LogFormat::Haystack, LogFormat::HaystackLegacy];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Haystack => "haystack",
            LogFormat::HaystackLegacy => "haystack-legacy",
        }
    }

    pub(crate) fn patterns(&self) -> &'static HaystackPatterns {
        match self {
            LogFormat::Haystack => &*HAYSTACK,
            LogFormat::HaystackLegacy => &*HAYSTACK_LEGACY,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| {
                format!("unknown log format: {s} (expected haystack or haystack-legacy)")
            })
    }
}

/// Format tag for the grid benchmark (recall/throughput) logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BenchDialect {
    /// Quantization and graph parameters on their own lines,
    /// `Query [(memory)|(disk)] top K/O recall R in Ts ...`
    #[default]
    Bench,
    /// `Query PQ=<bool> top K/O recall R in Ts ...`; the PQ flag stands in for
    /// the quantization context.
    BenchLegacy,
}

impl BenchDialect {
    pub const ALL: [BenchDialect; 2] = [BenchDialect::Bench, BenchDialect::BenchLegacy];

    pub fn as_str(&self) -> &'static str {
        match self {
            BenchDialect::Bench => "bench",
            BenchDialect::BenchLegacy => "bench-legacy",
        }
    }

    pub(crate) fn patterns(&self) -> &'static BenchPatterns {
        match self {
            BenchDialect::Bench => &*BENCH,
            BenchDialect::BenchLegacy => &*BENCH_LEGACY,
        }
    }
}

impl fmt::Display for BenchDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| {
                format!("unknown bench dialect: {s} (expected bench or bench-legacy)")
            })
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("log line pattern must compile")
}

// Pattern tables, compiled on first use
lazy_static! {
    static ref HEADER: Regex = compile(DATASET_HEADER);
    static ref HAYSTACK: HaystackPatterns = HaystackPatterns::new(HAYSTACK_BUILD);
    static ref HAYSTACK_LEGACY: HaystackPatterns = HaystackPatterns::new(HAYSTACK_LEGACY_BUILD);
    static ref BENCH: BenchPatterns = BenchPatterns::new(BENCH_QUERY);
    static ref BENCH_LEGACY: BenchPatterns = BenchPatterns::new(BENCH_LEGACY_QUERY);
}

/// Shared dataset header pattern.
pub(crate) fn dataset_header() -> &'static Regex {
    &*HEADER
}

/// Pattern table for haystack logs.
#[derive(Debug)]
pub(crate) struct HaystackPatterns {
    pub build: Regex,
    pub probe: Regex,
}

impl HaystackPatterns {
    fn new(build: &str) -> Self {
        Self {
            build: compile(build),
            probe: compile(HAYSTACK_PROBE),
        }
    }
}

/// Pattern table for grid benchmark logs.
#[derive(Debug)]
pub(crate) struct BenchPatterns {
    pub product_quantization: Regex,
    pub binary_quantization: Regex,
    pub uncompressed: Regex,
    pub graph: Regex,
    pub query: Regex,
}

impl BenchPatterns {
    fn new(query: &str) -> Self {
        Self {
            product_quantization: compile(BENCH_PRODUCT_QUANTIZATION),
            binary_quantization: compile(BENCH_BINARY_QUANTIZATION),
            uncompressed: compile(BENCH_UNCOMPRESSED),
            graph: compile(BENCH_GRAPH),
            query: compile(query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_header_variants() {
        let re = dataset_header();
        let caps = re
            .captures("mydata: 100 base and 50 query vectors loaded, dimensions 8")
            .unwrap();
        assert_eq!(&caps["name"], "mydata");
        assert_eq!(&caps["base"], "100");
        assert_eq!(&caps["query"], "50");
        assert_eq!(&caps["dims"], "8");

        assert!(re
            .is_match("random-2d: 1000 base and 10 query vectors created, dimensions 2"));
        assert!(!re.is_match("100 base and 50 query vectors"));
    }

    #[test]
    fn test_haystack_build_variants() {
        let p = LogFormat::Haystack.patterns();
        let caps = p
            .build
            .captures("Build N=100 M=16 ef=64 in 1.0s with 20.0 short edges")
            .unwrap();
        assert_eq!(&caps["n"], "100");
        assert_eq!(&caps["secs"], "1.0");
        assert_eq!(&caps["short"], "20.0");

        let line = "Build N=4096 M=32 ef=100 in 3.21s with avg degree 30.10 and 0.85 short edges";
        let caps = p.build.captures(line).unwrap();
        assert_eq!(&caps["short"], "0.85");

        let legacy = LogFormat::HaystackLegacy.patterns();
        assert!(legacy
            .build
            .is_match("Build nVectors=8192, M=16 ef=100 in 0.52s with 0.91 short edges"));
        assert!(!p
            .build
            .is_match("Build nVectors=8192, M=16 ef=100 in 0.52s with 0.91 short edges"));
    }

    #[test]
    fn test_bench_query_variants() {
        let p = BenchDialect::Bench.patterns();
        let line =
            "  Query (memory) top 100/2 recall 0.9876 in 1.25s after 1,234,567 nodes visited";
        let caps = p.query.captures(line).unwrap();
        assert_eq!(&caps["location"], "memory");
        assert_eq!(&caps["visited"], "1,234,567");

        let caps = p
            .query
            .captures("  Query top 100/4 recall 0.9000 in 2.00s after 10 nodes visited")
            .unwrap();
        assert!(caps.name("location").is_none());
        assert_eq!(&caps["overquery"], "4");

        let legacy = BenchDialect::BenchLegacy.patterns();
        let caps = legacy
            .query
            .captures("  Query PQ=true top 100/2 recall 0.8123 in 4.10s after 99 nodes visited")
            .unwrap();
        assert_eq!(&caps["pq"], "true");
        assert!(!legacy.query.is_match("  Query top 100/4 recall 0.9000 in 2.00s"));
    }

    #[test]
    fn test_product_quantization_size_is_optional() {
        let p = BenchDialect::Bench.patterns();
        let caps = p
            .product_quantization
            .captures("ProductQuantization(16) encoded 1000 vectors")
            .unwrap();
        assert_eq!(&caps["subspaces"], "16");

        for line in [
            "ProductQuantization encoded 10 vectors",
            "ProductQuantization(M=16, clusters=256) encoded 1000 vectors",
        ] {
            let caps = p.product_quantization.captures(line).unwrap();
            assert!(caps.name("subspaces").is_none(), "{line}");
        }
    }

    #[test]
    fn test_format_tags_round_trip_through_str() {
        for f in LogFormat::ALL {
            assert_eq!(f.as_str().parse::<LogFormat>().unwrap(), f);
        }
        for d in BenchDialect::ALL {
            assert_eq!(d.to_string().parse::<BenchDialect>().unwrap(), d);
        }
        assert!("csv".parse::<LogFormat>().is_err());
    }
}
