// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight work item tracking.
//!
//! Watches the event stream of a run and remembers every test or suite that
//! started but has not finished. After a forced stop that times out, the
//! tracker reports those items as cancelled so listeners still see a finish
//! event for everything that started.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::driver::TestEventListener;
use crate::xml::{self, Element, StartTag};

const CANCELLED_MESSAGE: &str = "Test run cancelled by user";

#[derive(Debug)]
struct InProgressItem {
    order: u64,
    element: String,
    tag: StartTag,
}

#[derive(Debug, Default)]
struct TrackerState {
    items: HashMap<String, InProgressItem>,
    next_order: u64,
    complete: bool,
}

/// Tracks started-but-unfinished items; see the module docs.
#[derive(Debug, Default)]
pub struct WorkItemTracker {
    state: Mutex<TrackerState>,
    drained: Condvar,
    /// Held while cancellations are sent so a concurrent caller returns only
    /// after they were delivered.
    cancelling: Mutex<()>,
}

impl WorkItemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all items and reset the completion gate.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.complete = false;
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Block until every started item has finished, or `timeout` passes.
    ///
    /// Returns false on timeout.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        self.drained.wait_while_for(&mut state, |s| !s.complete, timeout);
        state.complete
    }

    /// Emit a cancelled finish event for every tracked item, most recently
    /// started first, then forget them.
    pub fn send_pending_test_completion_events(&self, listener: &dyn TestEventListener) {
        let _cancelling = self.cancelling.lock();
        let mut pending: Vec<InProgressItem> = {
            let mut state = self.state.lock();
            state.items.drain().map(|(_, item)| item).collect()
        };
        pending.sort_by(|a, b| b.order.cmp(&a.order));

        for item in pending {
            tracing::debug!("cancelling unfinished {} {:?}", item.element, item.tag.attribute("id"));
            listener.on_test_event(&cancelled_event(&item));
        }
    }
}

fn cancelled_event(item: &InProgressItem) -> String {
    let is_test = item.element == "start-test";
    let mut event = Element::new(if is_test { "test-case" } else { "test-suite" })
        .attr_opt("id", item.tag.attribute("id"))
        .attr_opt("name", item.tag.attribute("name"))
        .attr_opt("fullname", item.tag.attribute("fullname"));
    if !is_test {
        event = event.attr_opt("type", item.tag.attribute("type"));
    }
    event
        .attr("result", "Failed")
        .attr("label", "Cancelled")
        .child(format!("<failure><message>{}</message></failure>", xml::cdata(CANCELLED_MESSAGE)))
        .to_string()
}

impl TestEventListener for WorkItemTracker {
    fn on_test_event(&self, event: &str) {
        let Some(tag) = StartTag::parse(event) else {
            return;
        };
        let Some(id) = tag.attribute("id").map(str::to_string) else {
            return;
        };

        match tag.name() {
            "start-test" | "start-suite" => {
                let mut state = self.state.lock();
                let order = state.next_order;
                state.next_order += 1;
                state.complete = false;
                let element = tag.name().to_string();
                state.items.insert(id, InProgressItem { order, element, tag });
            }
            "test-case" | "test-suite" => {
                let mut state = self.state.lock();
                if state.items.remove(&id).is_some() && state.items.is_empty() {
                    state.complete = true;
                    self.drained.notify_all();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "work_items_tests.rs"]
mod tests;
