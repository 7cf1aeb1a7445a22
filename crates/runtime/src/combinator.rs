//! Latest-of-two stream combinator

use crate::Result;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream holding the most recent value of two sources.
///
/// Every new value from either source re-runs `combine` over both latest
/// values, but only once each source has produced at least once. Earlier
/// values are overwritten, never emitted. The first error from a source or
/// from `combine` is yielded and ends the stream. The stream also ends when
/// both sources have ended, or when a source ends without ever producing.
pub struct CombineLatest<A, B, F> {
    left: Option<BoxStream<'static, Result<A>>>,
    right: Option<BoxStream<'static, Result<B>>>,
    latest_left: Option<A>,
    latest_right: Option<B>,
    combine: F,
    left_first: bool,
    done: bool,
}

// Sources are boxed, no field is structurally pinned
impl<A, B, F> Unpin for CombineLatest<A, B, F> {}

pub fn combine_latest<A, B, T, F>(
    left: BoxStream<'static, Result<A>>,
    right: BoxStream<'static, Result<B>>,
    combine: F,
) -> CombineLatest<A, B, F>
where
    F: FnMut(&A, &B) -> Result<T>,
{
    CombineLatest {
        left: Some(left),
        right: Some(right),
        latest_left: None,
        latest_right: None,
        combine,
        left_first: true,
        done: false,
    }
}

enum Side {
    Left,
    Right,
}

enum Step<T> {
    Yield(Result<T>),
    Finish,
    Updated,
    Idle,
}

impl<A, B, F> CombineLatest<A, B, F> {
    fn poll_side<T>(&mut self, side: &Side, cx: &mut Context<'_>) -> Step<T>
    where
        F: FnMut(&A, &B) -> Result<T>,
    {
        let polled = match side {
            Side::Left => match self.left.as_mut() {
                Some(stream) => stream.poll_next_unpin(cx).map(|item| item.map(|r| r.map(Slot::Left))),
                None => return Step::Idle,
            },
            Side::Right => match self.right.as_mut() {
                Some(stream) => stream.poll_next_unpin(cx).map(|item| item.map(|r| r.map(Slot::Right))),
                None => return Step::Idle,
            },
        };

        match polled {
            Poll::Pending => Step::Idle,
            Poll::Ready(Some(Err(e))) => Step::Yield(Err(e)),
            Poll::Ready(Some(Ok(slot))) => {
                match slot {
                    Slot::Left(value) => self.latest_left = Some(value),
                    Slot::Right(value) => self.latest_right = Some(value),
                }
                match (&self.latest_left, &self.latest_right) {
                    (Some(left), Some(right)) => Step::Yield((self.combine)(left, right)),
                    _ => Step::Updated,
                }
            }
            Poll::Ready(None) => {
                let produced = match side {
                    Side::Left => {
                        self.left = None;
                        self.latest_left.is_some()
                    }
                    Side::Right => {
                        self.right = None;
                        self.latest_right.is_some()
                    }
                };
                if !produced || (self.left.is_none() && self.right.is_none()) {
                    Step::Finish
                } else {
                    Step::Idle
                }
            }
        }
    }
}

enum Slot<A, B> {
    Left(A),
    Right(B),
}

impl<A, B, T, F> Stream for CombineLatest<A, B, F>
where
    F: FnMut(&A, &B) -> Result<T>,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            let order = if this.left_first {
                [Side::Left, Side::Right]
            } else {
                [Side::Right, Side::Left]
            };
            this.left_first = !this.left_first;

            let mut updated = false;
            for side in &order {
                match this.poll_side(side, cx) {
                    Step::Yield(item) => {
                        if item.is_err() {
                            this.done = true;
                        }
                        return Poll::Ready(Some(item));
                    }
                    Step::Finish => {
                        this.done = true;
                        return Poll::Ready(None);
                    }
                    Step::Updated => updated = true,
                    Step::Idle => {}
                }
            }

            if !updated {
                return Poll::Pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuntimeError;
    use futures::{stream, FutureExt};
    use tokio::sync::{mpsc, oneshot};
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn sum(a: &u32, b: &u32) -> Result<u32> {
        Ok(a + b)
    }

    #[tokio::test]
    async fn test_waits_for_both_sources() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = oneshot::channel::<Result<u32>>();

        let mut combined = combine_latest(
            UnboundedReceiverStream::new(left_rx).boxed(),
            stream::once(async move { right_rx.await.unwrap_or(Err(RuntimeError::Closed)) }).boxed(),
            sum,
        );

        left_tx.send(Ok(1)).unwrap();
        left_tx.send(Ok(2)).unwrap();
        assert!(combined.next().now_or_never().is_none());

        right_tx.send(Ok(100)).unwrap();
        assert_eq!(combined.next().await.unwrap().unwrap(), 102);
        assert!(combined.next().now_or_never().is_none());

        left_tx.send(Ok(3)).unwrap();
        assert_eq!(combined.next().await.unwrap().unwrap(), 103);
    }

    #[tokio::test]
    async fn test_every_update_after_population_emits() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();

        let mut combined = combine_latest(
            UnboundedReceiverStream::new(left_rx).boxed(),
            UnboundedReceiverStream::new(right_rx).boxed(),
            sum,
        );

        left_tx.send(Ok(1)).unwrap();
        right_tx.send(Ok(10)).unwrap();
        assert_eq!(combined.next().await.unwrap().unwrap(), 11);

        right_tx.send(Ok(20)).unwrap();
        assert_eq!(combined.next().await.unwrap().unwrap(), 21);

        left_tx.send(Ok(5)).unwrap();
        assert_eq!(combined.next().await.unwrap().unwrap(), 25);

        drop(left_tx);
        drop(right_tx);
        assert!(combined.next().await.is_none());
    }

    #[tokio::test]
    async fn test_source_error_ends_stream() {
        let left = stream::iter(vec![Ok(1), Err(RuntimeError::WebSocket("reset".to_string())), Ok(2)]).boxed();
        let right = stream::pending().boxed();

        let mut combined = combine_latest(left, right, sum);

        assert!(matches!(
            combined.next().await,
            Some(Err(RuntimeError::WebSocket(_)))
        ));
        assert!(combined.next().await.is_none());
    }

    #[tokio::test]
    async fn test_source_ending_empty_ends_stream() {
        let left = stream::iter(vec![Ok(1), Ok(2)]).boxed();
        let right = stream::empty().boxed();

        let outputs: Vec<_> = combine_latest(left, right, sum).collect().await;
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_ended_source_keeps_its_latest_value() {
        let left = stream::iter(vec![Ok(1)]).boxed();
        let right = stream::iter(vec![Ok(10), Ok(20)]).boxed();

        let outputs: Vec<u32> = combine_latest(left, right, sum)
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(outputs, vec![11, 21]);
    }

    #[tokio::test]
    async fn test_combine_error_ends_stream() {
        let left = stream::iter(vec![Ok(1u32), Ok(2)]).boxed();
        let right = stream::iter(vec![Ok(1u32)]).boxed();

        let mut combined = combine_latest(left, right, |_: &u32, _: &u32| -> Result<u32> {
            Err(RuntimeError::ArrayTooShort(3))
        });

        assert!(matches!(
            combined.next().await,
            Some(Err(RuntimeError::ArrayTooShort(3)))
        ));
        assert!(combined.next().await.is_none());
    }
}
