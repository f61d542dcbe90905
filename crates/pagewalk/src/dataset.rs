//! Loader for the plain-text dataset format.
//!
//! The file is a stream of whitespace-separated unsigned decimal integers:
//!
//! ```text
//! <cell count> <query count> <root table address>
//! <cell count> pairs of: <physical address> <raw value>
//! <query count> values of: <virtual address>
//! ```

use std::fmt;
use std::str::SplitAsciiWhitespace;

use paging::{
    MemoryCell, MemorySnapshot, PagingContext, PhysicalAddress, VirtualAddress, WalkOptions,
};

/// Upper bound on how many entries are reserved up front from a declared count.
///
/// Declared counts come from the input and are only trusted as a hint.
const MAX_PREALLOCATED: usize = 1 << 20;

/// Errors that can occur while parsing a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// The input ended before a required value.
    UnexpectedEof { expected: &'static str },
    /// A token was not an unsigned 64-bit decimal integer.
    InvalidNumber { token: String, expected: &'static str },
    /// Tokens remain after the last declared query.
    TrailingInput { token: String },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            DatasetError::InvalidNumber { token, expected } => {
                write!(f, "invalid {expected} {token:?}, expected an unsigned decimal integer")
            }
            DatasetError::TrailingInput { token } => {
                write!(f, "unexpected token {token:?} after the last query")
            }
        }
    }
}

impl std::error::Error for DatasetError {}

/// A parsed dataset: the memory dump and the addresses to translate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Physical address of the PML4.
    pub root: PhysicalAddress,
    /// Memory cells in file order, including non-present ones.
    pub cells: Vec<MemoryCell>,
    /// Virtual addresses to translate, in file order.
    pub queries: Vec<VirtualAddress>,
}

impl Dataset {
    /// Parses a dataset from its text form.
    pub fn parse(input: &str) -> Result<Self, DatasetError> {
        let mut tokens = Tokens::new(input);

        let cell_count = tokens.next_u64("cell count")?;
        let query_count = tokens.next_u64("query count")?;
        let root = PhysicalAddress::new(tokens.next_u64("root table address")?);

        let mut cells = Vec::with_capacity(preallocation(cell_count));
        for _ in 0..cell_count {
            let address = tokens.next_u64("cell address")?;
            let raw = tokens.next_u64("cell value")?;
            cells.push(MemoryCell::new(address, raw));
        }

        let mut queries = Vec::with_capacity(preallocation(query_count));
        for _ in 0..query_count {
            queries.push(VirtualAddress::new(tokens.next_u64("virtual address")?));
        }

        if let Some(token) = tokens.inner.next() {
            return Err(DatasetError::TrailingInput {
                token: token.to_string(),
            });
        }

        log::info!(
            "Loaded dataset: {} cells, {} queries, root table at {}",
            cells.len(),
            queries.len(),
            root
        );

        Ok(Self {
            root,
            cells,
            queries,
        })
    }

    /// Builds the paging context and hands back the queries to run against it.
    ///
    /// Non-present cells are dropped while the snapshot is built.
    pub fn into_context(self, options: WalkOptions) -> (PagingContext, Vec<VirtualAddress>) {
        let snapshot = MemorySnapshot::from_cells(self.cells);
        let context = PagingContext::new(self.root, snapshot).with_options(options);
        (context, self.queries)
    }
}

fn preallocation(declared: u64) -> usize {
    usize::try_from(declared)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATED)
}

struct Tokens<'a> {
    inner: SplitAsciiWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            inner: input.split_ascii_whitespace(),
        }
    }

    fn next_u64(&mut self, expected: &'static str) -> Result<u64, DatasetError> {
        let token = self
            .inner
            .next()
            .ok_or(DatasetError::UnexpectedEof { expected })?;

        token
            .parse::<u64>()
            .map_err(|_| DatasetError::InvalidNumber {
                token: token.to_string(),
                expected,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paging::Translation;

    const SAMPLE: &str = "\
4 3 4096
4096 8193
8192 12289
12288 16385
16384 20481
0
291
4096
";

    #[test]
    fn parses_sample() {
        let dataset = Dataset::parse(SAMPLE).unwrap();

        assert_eq!(dataset.root, PhysicalAddress::new(0x1000));
        assert_eq!(dataset.cells.len(), 4);
        assert_eq!(dataset.cells[0], MemoryCell::new(0x1000, 0x2001));
        assert_eq!(
            dataset.queries,
            vec![
                VirtualAddress::new(0),
                VirtualAddress::new(0x123),
                VirtualAddress::new(0x1000)
            ]
        );
    }

    #[test]
    fn layout_is_whitespace_insensitive() {
        let flat = SAMPLE
            .split_ascii_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(Dataset::parse(&flat), Dataset::parse(SAMPLE));
    }

    #[test]
    fn builds_context() {
        let (context, queries) = Dataset::parse(SAMPLE)
            .unwrap()
            .into_context(WalkOptions::default());

        let results: Vec<_> = context
            .translate_all(queries)
            .into_iter()
            .map(Translation::address)
            .collect();
        assert_eq!(
            results,
            vec![
                Some(PhysicalAddress::new(0x5000)),
                Some(PhysicalAddress::new(0x5123)),
                None
            ]
        );
    }

    #[test]
    fn keeps_non_present_cells_until_snapshot() {
        let dataset = Dataset::parse("2 0 4096 4096 8192 4104 8193").unwrap();
        assert_eq!(dataset.cells.len(), 2);

        let (context, _) = dataset.into_context(WalkOptions::default());
        assert_eq!(context.memory().len(), 1);
        assert_eq!(context.memory().stats().non_present_dropped, 1);
    }

    #[test]
    fn accepts_full_u64_range() {
        let dataset = Dataset::parse("0 1 0 18446744073709551615").unwrap();
        assert_eq!(dataset.queries, vec![VirtualAddress::new(u64::MAX)]);
    }

    #[test]
    fn empty_dataset() {
        let dataset = Dataset::parse("0 0 0").unwrap();
        assert!(dataset.cells.is_empty());
        assert!(dataset.queries.is_empty());
    }

    mod errors {
        use super::*;

        #[test]
        fn empty_input() {
            assert_eq!(
                Dataset::parse(""),
                Err(DatasetError::UnexpectedEof {
                    expected: "cell count"
                })
            );
        }

        #[test]
        fn truncated_cell() {
            assert_eq!(
                Dataset::parse("1 0 4096 4096"),
                Err(DatasetError::UnexpectedEof {
                    expected: "cell value"
                })
            );
        }

        #[test]
        fn missing_query() {
            assert_eq!(
                Dataset::parse("0 2 4096 1"),
                Err(DatasetError::UnexpectedEof {
                    expected: "virtual address"
                })
            );
        }

        #[test]
        fn hex_is_rejected() {
            assert_eq!(
                Dataset::parse("0 1 0x1000 0"),
                Err(DatasetError::InvalidNumber {
                    token: "0x1000".to_string(),
                    expected: "root table address"
                })
            );
        }

        #[test]
        fn negative_is_rejected() {
            assert!(matches!(
                Dataset::parse("0 1 4096 -1"),
                Err(DatasetError::InvalidNumber { .. })
            ));
        }

        #[test]
        fn overflow_is_rejected() {
            assert!(matches!(
                Dataset::parse("0 1 0 18446744073709551616"),
                Err(DatasetError::InvalidNumber { .. })
            ));
        }

        #[test]
        fn trailing_tokens() {
            assert_eq!(
                Dataset::parse("0 1 4096 5 6"),
                Err(DatasetError::TrailingInput {
                    token: "6".to_string()
                })
            );
        }

        #[test]
        fn display_messages() {
            let error = DatasetError::InvalidNumber {
                token: "abc".to_string(),
                expected: "cell address",
            };
            assert_eq!(
                error.to_string(),
                "invalid cell address \"abc\", expected an unsigned decimal integer"
            );
        }
    }
}
