use crate::{
    limits::ServerLimits,
    net::transport::Transport,
    scheduler::{Scheduler, Task},
    server::{connection::Connection, server_impl::ServerContext},
};
use std::io;
use std::net::TcpListener;
use std::rc::Rc;

/// The accept-loop task.
///
/// Runs for the life of the server: each tick it drains up to
/// `max_accepts_per_tick` pending connections from the non-blocking
/// listener and registers each as its own task. When the scheduler is at
/// capacity the new socket is dropped on the spot; the OS accept backlog
/// is the only queue.
pub(crate) struct ListenerTask {
    listener: TcpListener,
    ctx: Rc<ServerContext>,
    limits: ServerLimits,
    next_connection: u64,
}

impl ListenerTask {
    pub(crate) fn new(
        listener: TcpListener,
        ctx: Rc<ServerContext>,
        limits: ServerLimits,
    ) -> Self {
        Self {
            listener,
            ctx,
            limits,
            next_connection: 0,
        }
    }
}

impl Task for ListenerTask {
    fn run(&mut self, sched: &mut Scheduler) {
        for _ in 0..self.limits.max_accepts_per_tick {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Transient accept faults (EMFILE, aborted handshakes)
                    // must not tear the listener down.
                    log::error!("accept failed: {}", e);
                    return;
                }
            };

            self.next_connection += 1;
            let number = self.next_connection;
            self.ctx.accepted.set(self.ctx.accepted.get() + 1);

            let transport = match Transport::new(stream) {
                Ok(transport) => transport,
                Err(e) => {
                    log::error!("connection #{}: set_nonblocking failed: {}", number, e);
                    continue;
                }
            };

            let connection = Connection::new(transport, number, self.ctx.clone());
            if let Err(e) = sched.add(Box::new(connection)) {
                log::warn!("shedding connection #{} from {}: {}", number, peer, e);
            }
        }
    }

    fn attached(&mut self, _: &mut Scheduler) {
        match self.listener.local_addr() {
            Ok(addr) => log::info!("listening on {}", addr),
            Err(_) => log::info!("listening"),
        }
    }

    fn cleanup(&mut self, _: &mut Scheduler) {
        log::info!(
            "listener closing after {} accepted connections",
            self.ctx.accepted.get()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{ConnLimits, SchedLimits};
    use std::net::TcpStream;
    use std::time::Duration;

    fn nonblocking_listener() -> TcpListener {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        listener
    }

    fn task(listener: TcpListener) -> (ListenerTask, Rc<ServerContext>) {
        let ctx = Rc::new(ServerContext::for_tests(ConnLimits::default()));
        let task = ListenerTask::new(listener, ctx.clone(), ServerLimits::default());
        (task, ctx)
    }

    #[test]
    fn idle_listener_returns_immediately() {
        let (mut task, ctx) = task(nonblocking_listener());
        let mut sched = Scheduler::new(&SchedLimits::default());

        task.run(&mut sched);
        assert_eq!(ctx.accepted.get(), 0);
        assert_eq!(sched.task_count(), 0);
    }

    #[test]
    fn accepted_sockets_become_tasks() {
        let listener = nonblocking_listener();
        let addr = listener.local_addr().unwrap();
        let (mut task, ctx) = task(listener);
        let mut sched = Scheduler::new(&SchedLimits::default());

        let _a = TcpStream::connect(addr).unwrap();
        let _b = TcpStream::connect(addr).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        task.run(&mut sched);
        assert_eq!(ctx.accepted.get(), 2);
        assert_eq!(sched.task_count(), 2);
        assert_eq!(ctx.active.get(), 2);
    }

    #[test]
    fn capacity_overflow_sheds_instead_of_queueing() {
        let listener = nonblocking_listener();
        let addr = listener.local_addr().unwrap();
        let (mut task, ctx) = task(listener);

        // Room for exactly one connection task.
        let mut sched = Scheduler::new(&SchedLimits {
            max_tasks: 1,
            ..SchedLimits::default()
        });

        let mut kept = TcpStream::connect(addr).unwrap();
        let mut shed = TcpStream::connect(addr).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        task.run(&mut sched);
        assert_eq!(ctx.accepted.get(), 2);
        assert_eq!(sched.task_count(), 1);

        // The shed socket was closed without a response; the kept one is
        // still open (a write goes through).
        shed.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(std::io::Read::read(&mut shed, &mut buf).unwrap(), 0);
        assert!(std::io::Write::write(&mut kept, b"GET ").is_ok());
    }

    #[test]
    fn accept_batch_is_bounded_per_run() {
        let listener = nonblocking_listener();
        let addr = listener.local_addr().unwrap();
        let ctx = Rc::new(ServerContext::for_tests(ConnLimits::default()));
        let mut task = ListenerTask::new(
            listener,
            ctx.clone(),
            ServerLimits {
                max_accepts_per_tick: 2,
                ..ServerLimits::default()
            },
        );
        let mut sched = Scheduler::new(&SchedLimits::default());

        let _clients: Vec<_> = (0..5).map(|_| TcpStream::connect(addr).unwrap()).collect();
        std::thread::sleep(Duration::from_millis(30));

        task.run(&mut sched);
        assert_eq!(ctx.accepted.get(), 2);

        task.run(&mut sched);
        task.run(&mut sched);
        assert_eq!(ctx.accepted.get(), 5);
    }
}
