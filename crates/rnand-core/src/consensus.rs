//! Consensus page reads
//!
//! The bus has no hardware ECC assurance, so a page is only accepted when
//! two independent reads return identical bytes. This filters transient
//! transfer corruption; it does not correct errors stored in the array and
//! is not a substitute for real ECC. A page costs up to `2 * attempts`
//! device transactions.

use crate::bus::NandBus;
use crate::error::{Error, Result};
use crate::protocol::{NandDevice, PageBuffer};

/// Default number of read pairs attempted per page
pub const MAX_ATTEMPTS: usize = 8;

/// Anything that can produce raw page reads
pub trait PageSource {
    /// Read one raw page
    fn read_raw_page(&mut self, page: u32) -> Result<PageBuffer>;
}

impl<B: NandBus> PageSource for NandDevice<B> {
    fn read_raw_page(&mut self, page: u32) -> Result<PageBuffer> {
        self.read_page(page)
    }
}

/// Read a page until two consecutive reads agree
///
/// Each attempt performs two reads. The first matching pair is returned.
/// A transport failure (or a read that returns no data) aborts at once;
/// exhausting every attempt yields [`Error::ConsensusFailure`].
pub fn read_page_confirmed<S: PageSource + ?Sized>(
    source: &mut S,
    page: u32,
    max_attempts: usize,
) -> Result<PageBuffer> {
    for attempt in 0..max_attempts {
        let first = source.read_raw_page(page)?;
        let second = source.read_raw_page(page)?;

        if first.data.is_empty() || second.data.is_empty() {
            log::error!("consensus: page {} read returned no data", page);
            return Err(Error::Transport);
        }

        if first.data == second.data {
            if attempt > 0 {
                log::debug!("consensus: page {} agreed on attempt {}", page, attempt + 1);
            }
            return Ok(first);
        }

        let diff = first
            .data
            .iter()
            .zip(second.data.iter())
            .filter(|(a, b)| a != b)
            .count();
        log::debug!(
            "consensus: page {} attempt {} mismatch ({} bytes differ)",
            page,
            attempt + 1,
            diff
        );
    }

    log::warn!(
        "consensus: unable to get a good read of page {} after {} attempts",
        page,
        max_attempts
    );
    Err(Error::ConsensusFailure {
        page,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tests::{identified_device, MockBus, TEST_PROFILE};
    use alloc::collections::VecDeque;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Replays scripted page reads
    struct Scripted {
        reads: VecDeque<Result<Vec<u8>>>,
        calls: usize,
    }

    impl Scripted {
        fn new(reads: Vec<Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                calls: 0,
            }
        }
    }

    impl PageSource for Scripted {
        fn read_raw_page(&mut self, page: u32) -> Result<PageBuffer> {
            self.calls += 1;
            let data = self.reads.pop_front().unwrap_or(Err(Error::Transport))?;
            Ok(PageBuffer { page, data })
        }
    }

    #[test]
    fn test_identical_pair_returned() {
        let mut src = Scripted::new(vec![Ok(vec![7u8; 32]), Ok(vec![7u8; 32])]);
        let page = read_page_confirmed(&mut src, 12, MAX_ATTEMPTS).unwrap();
        assert_eq!(page.page, 12);
        assert_eq!(page.data, vec![7u8; 32]);
        assert_eq!(src.calls, 2);
    }

    #[test]
    fn test_agreement_on_later_attempt() {
        let mut src = Scripted::new(vec![
            Ok(vec![1, 2, 3]),
            Ok(vec![1, 2, 4]),
            Ok(vec![1, 2, 3]),
            Ok(vec![1, 2, 3]),
        ]);
        let page = read_page_confirmed(&mut src, 0, MAX_ATTEMPTS).unwrap();
        assert_eq!(page.data, vec![1, 2, 3]);
        assert_eq!(src.calls, 4);
    }

    #[test]
    fn test_pairs_never_agree() {
        let mut reads = Vec::new();
        for i in 0..(2 * MAX_ATTEMPTS) {
            reads.push(Ok(vec![i as u8; 8]));
        }
        let mut src = Scripted::new(reads);
        assert_eq!(
            read_page_confirmed(&mut src, 5, MAX_ATTEMPTS),
            Err(Error::ConsensusFailure {
                page: 5,
                attempts: MAX_ATTEMPTS
            })
        );
        assert_eq!(src.calls, 2 * MAX_ATTEMPTS);
    }

    #[test]
    fn test_matching_reads_across_attempts_do_not_count() {
        // Second read of attempt 1 equals first read of attempt 2, but the
        // reads inside each pair differ
        let mut src = Scripted::new(vec![
            Ok(vec![1]),
            Ok(vec![2]),
            Ok(vec![2]),
            Ok(vec![3]),
        ]);
        assert!(matches!(
            read_page_confirmed(&mut src, 0, 2),
            Err(Error::ConsensusFailure { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_transport_error_aborts_immediately() {
        let mut src = Scripted::new(vec![Ok(vec![1]), Ok(vec![2]), Err(Error::Transport)]);
        assert_eq!(
            read_page_confirmed(&mut src, 0, MAX_ATTEMPTS),
            Err(Error::Transport)
        );
        assert_eq!(src.calls, 3);
    }

    #[test]
    fn test_empty_read_aborts_immediately() {
        let mut src = Scripted::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![9]), Ok(vec![9])]);
        assert_eq!(
            read_page_confirmed(&mut src, 0, MAX_ATTEMPTS),
            Err(Error::Transport)
        );
        assert_eq!(src.calls, 2);
    }

    #[test]
    fn test_device_confirmed_read() {
        let mut dev = identified_device();
        let raw = vec![0x3C; TEST_PROFILE.geometry.raw_page_size()];
        dev.bus_mut().push(&raw);
        dev.bus_mut().push(&raw);
        let page = dev.read_page_confirmed(1).unwrap();
        assert_eq!(page.data, raw);
        assert!(dev.bus().stream.is_empty());
    }

    #[test]
    fn test_device_confirmed_read_transport_failure() {
        let mut bus = MockBus::default();
        bus.fail_poll = true;
        let mut dev = identified_device();
        *dev.bus_mut() = bus;
        assert_eq!(dev.read_page_confirmed(1), Err(Error::Transport));
    }
}
