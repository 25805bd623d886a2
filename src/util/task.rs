use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Yields to the executor once before resuming.
///
/// Long page-by-page walks await this between pages so other pending work can
/// interleave and the walk never grows the call stack.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
