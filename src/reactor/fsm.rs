// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

//! Event-driven state machine registry. Each worker owns one kernel;
//! machines are pinned to it for their entire life. A machine exposes a
//! live handler and a shutdown handler; once stopped, events are routed
//! to the shutdown handler until the machine reports completion and all
//! of its children are gone, at which point `Stopped` is raised to the
//! parent. This choreography is what guarantees that no event is
//! delivered to a structure that is being torn down.

use std::collections::VecDeque;

/// Identifies a machine inside one kernel. The generation guards against
/// slot reuse: events addressed to a finalized machine are dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FsmId {
    index: usize,
    gen: u64
}

pub enum Event<E> {
    Start,
    Stop,
    Stopped(FsmId),
    User(E)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shutdown {
    InProgress,
    Done
}

pub trait Machine<E> {
    fn handle(&mut self, ctx: &mut Context<E>, ev: Event<E>);

    /// Invoked instead of `handle` once the machine is stopping.
    /// Returns `Done` when the machine has nothing left to drain;
    /// the kernel finalizes it once all children are gone as well.
    fn shutdown(&mut self, ctx: &mut Context<E>, ev: Event<E>) -> Shutdown;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Active,
    Stopping
}

struct Slot<E> {
    machine: Option<Box<dyn Machine<E>>>,
    gen: u64,
    parent: Option<FsmId>,
    lifecycle: Lifecycle,
    children: usize,
    self_done: bool
}

pub struct Kernel<E> {
    slots: Vec<Option<Slot<E>>>,
    free: Vec<usize>,
    gen: u64,
    queue: VecDeque<(FsmId, Event<E>)>
}

impl<E> Kernel<E> {
    pub fn new() -> Kernel<E> {
        Kernel {
            slots: Vec::new(),
            free: Vec::new(),
            gen: 0,
            queue: VecDeque::new()
        }
    }

    /// Registers a machine; its state becomes idle until `start`.
    pub fn insert(&mut self, machine: Box<dyn Machine<E>>, parent: Option<FsmId>) -> FsmId {
        self.gen += 1;

        let slot = Slot {
            machine: Some(machine),
            gen: self.gen,
            parent: parent,
            lifecycle: Lifecycle::Idle,
            children: 0,
            self_done: false
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        let id = FsmId { index: index, gen: self.gen };

        if let Some(parent) = parent {
            if let Some(pslot) = self.slot_mut(parent) {
                pslot.children += 1;
            }
        }

        id
    }

    pub fn start(&mut self, id: FsmId) {
        match self.slot_mut(id) {
            Some(slot) if slot.lifecycle == Lifecycle::Idle => slot.lifecycle = Lifecycle::Active,
            _ => return
        }

        self.queue.push_back((id, Event::Start));
    }

    /// Switches the machine to its shutdown handler. Stopping an already
    /// stopping machine is a no-op; stopping an idle one finalizes it
    /// without invoking any handler.
    pub fn stop(&mut self, id: FsmId) {
        let lifecycle = match self.slot_mut(id) {
            Some(slot) => slot.lifecycle,
            None => return
        };

        match lifecycle {
            Lifecycle::Stopping => {}
            Lifecycle::Idle => self.finalize(id),
            Lifecycle::Active => {
                if let Some(slot) = self.slot_mut(id) {
                    slot.lifecycle = Lifecycle::Stopping;
                }
                self.queue.push_back((id, Event::Stop));
            }
        }
    }

    pub fn raiseto(&mut self, id: FsmId, ev: Event<E>) {
        if self.slot_mut(id).is_some() {
            self.queue.push_back((id, ev));
        } else {
            trace!("event for a stopped machine dropped");
        }
    }

    /// Delivers queued events until the queue is drained.
    pub fn pump(&mut self) {
        while let Some((id, ev)) = self.queue.pop_front() {
            self.dispatch(id, ev);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    fn slot_mut(&mut self, id: FsmId) -> Option<&mut Slot<E>> {
        match self.slots.get_mut(id.index) {
            Some(&mut Some(ref mut slot)) if slot.gen == id.gen => Some(slot),
            _ => None
        }
    }

    fn dispatch(&mut self, id: FsmId, ev: Event<E>) {
        let (lifecycle, mut machine) = {
            let slot = match self.slot_mut(id) {
                Some(slot) => slot,
                None => {
                    trace!("event for a stopped machine dropped");
                    return;
                }
            };
            let machine = match slot.machine.take() {
                Some(machine) => machine,
                None => return
            };

            (slot.lifecycle, machine)
        };

        match lifecycle {
            Lifecycle::Idle => {
                trace!("event for an idle machine dropped");
                self.put_back(id, machine);
            }
            Lifecycle::Active => {
                {
                    let mut ctx = Context { id: id, kernel: self };
                    machine.handle(&mut ctx, ev);
                }
                self.put_back(id, machine);
            }
            Lifecycle::Stopping => {
                let done = {
                    let mut ctx = Context { id: id, kernel: self };
                    machine.shutdown(&mut ctx, ev)
                };

                self.put_back(id, machine);
                if done == Shutdown::Done {
                    if let Some(slot) = self.slot_mut(id) {
                        slot.self_done = true;
                    }
                }
                self.try_finalize(id);
            }
        }
    }

    fn put_back(&mut self, id: FsmId, machine: Box<dyn Machine<E>>) {
        if let Some(slot) = self.slot_mut(id) {
            slot.machine = Some(machine);
        }
    }

    fn try_finalize(&mut self, id: FsmId) {
        let complete = match self.slot_mut(id) {
            Some(slot) => slot.lifecycle == Lifecycle::Stopping && slot.self_done && slot.children == 0,
            None => false
        };

        if complete {
            self.finalize(id);
        }
    }

    fn finalize(&mut self, id: FsmId) {
        let parent = match self.slots.get_mut(id.index) {
            Some(entry) => {
                let parent = match *entry {
                    Some(ref slot) if slot.gen == id.gen => slot.parent,
                    _ => return
                };
                *entry = None;
                self.free.push(id.index);
                parent
            }
            None => return
        };

        if let Some(parent) = parent {
            if let Some(pslot) = self.slot_mut(parent) {
                pslot.children -= 1;
            }
            self.queue.push_back((parent, Event::Stopped(id)));
        }
    }
}

/// Handle a machine uses during a callback to interact with the kernel.
pub struct Context<'a, E: 'a> {
    id: FsmId,
    kernel: &'a mut Kernel<E>
}

impl<'a, E> Context<'a, E> {
    /// Registers and starts a child of the current machine.
    pub fn spawn_child(&mut self, machine: Box<dyn Machine<E>>) -> FsmId {
        let child = self.kernel.insert(machine, Some(self.id));

        self.kernel.start(child);
        child
    }

    pub fn stop_child(&mut self, id: FsmId) {
        self.kernel.stop(id);
    }

    pub fn child_count(&mut self) -> usize {
        match self.kernel.slot_mut(self.id) {
            Some(slot) => slot.children,
            None => 0
        }
    }

    /// Queues an event to the parent machine.
    pub fn raise(&mut self, ev: E) {
        let parent = match self.kernel.slot_mut(self.id) {
            Some(slot) => slot.parent,
            None => None
        };

        if let Some(parent) = parent {
            self.kernel.raiseto(parent, Event::User(ev));
        }
    }

    pub fn raiseto(&mut self, target: FsmId, ev: E) {
        self.kernel.raiseto(target, Event::User(ev));
    }

    /// Queues an event to self, ahead of anything already pending.
    /// Used to encode pure state transitions.
    pub fn action(&mut self, ev: E) {
        let id = self.id;

        self.kernel.queue.push_front((id, Event::User(ev)));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Leaf {
        log: Log,
        mark: &'static str
    }

    impl Machine<u32> for Leaf {
        fn handle(&mut self, _: &mut Context<u32>, _: Event<u32>) {}

        fn shutdown(&mut self, _: &mut Context<u32>, ev: Event<u32>) -> Shutdown {
            if let Event::Stop = ev {
                self.log.borrow_mut().push(self.mark);
            }
            Shutdown::Done
        }
    }

    struct Root {
        log: Log,
        children: Vec<FsmId>
    }

    impl Machine<u32> for Root {
        fn handle(&mut self, ctx: &mut Context<u32>, ev: Event<u32>) {
            if let Event::Start = ev {
                let first = ctx.spawn_child(Box::new(Leaf {
                    log: self.log.clone(),
                    mark: "first leaf"
                }));
                let second = ctx.spawn_child(Box::new(Leaf {
                    log: self.log.clone(),
                    mark: "second leaf"
                }));

                self.children.push(first);
                self.children.push(second);
            }
        }

        fn shutdown(&mut self, ctx: &mut Context<u32>, ev: Event<u32>) -> Shutdown {
            if let Event::Stop = ev {
                for child in self.children.drain(..) {
                    ctx.stop_child(child);
                }
            }
            if ctx.child_count() == 0 {
                self.log.borrow_mut().push("root");
                Shutdown::Done
            } else {
                Shutdown::InProgress
            }
        }
    }

    fn root_with_two_leaves() -> (Kernel<u32>, FsmId, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut kernel = Kernel::new();
        let root = kernel.insert(Box::new(Root {
            log: log.clone(),
            children: Vec::new()
        }), None);

        kernel.start(root);
        kernel.pump();

        (kernel, root, log)
    }

    #[test]
    fn children_reach_idle_before_the_root() {
        let (mut kernel, root, log) = root_with_two_leaves();

        kernel.stop(root);
        kernel.pump();

        assert_eq!(vec!["first leaf", "second leaf", "root"], *log.borrow());
        assert!(kernel.is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut kernel, root, log) = root_with_two_leaves();

        kernel.stop(root);
        kernel.stop(root);
        kernel.pump();
        kernel.stop(root);

        assert_eq!(3, log.borrow().len());
        assert!(kernel.is_empty());
    }

    #[test]
    fn event_for_a_stopped_machine_is_dropped() {
        let (mut kernel, root, _log) = root_with_two_leaves();

        kernel.stop(root);
        kernel.pump();
        kernel.raiseto(root, Event::User(7));
        kernel.pump();

        assert!(kernel.is_empty());
    }

    #[test]
    fn stopping_an_idle_machine_skips_the_handlers() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut kernel = Kernel::new();
        let id = kernel.insert(Box::new(Leaf {
            log: log.clone(),
            mark: "leaf"
        }), None);

        kernel.stop(id);
        kernel.pump();

        assert!(log.borrow().is_empty());
        assert!(kernel.is_empty());
    }
}
