//! Three-way reconciliation of named collections.
//!
//! Compares a previously known collection with a fresh one and reports every
//! entity as entered, updated, or exited. Pure and synchronous; callers turn
//! the changes into actions.

use std::collections::{HashMap, HashSet};

use crate::prelude::*;

/// Default reconciliation key
pub trait Named {
	fn name(&self) -> &str;
}

#[derive(Debug, PartialEq)]
pub enum Change<'a, T> {
	/// Only present in the new collection
	Enter(&'a T),
	/// Present in both, not equal
	Update { new: &'a T, old: &'a T },
	/// Only present in the old collection
	Exit(&'a T),
}

/// Callback form of the reconciliation. All hooks default to no-ops.
pub trait UpdateHandler<T> {
	fn on_enter(&mut self, _new: &T) {}
	fn on_update(&mut self, _new: &T, _old: &T) {}
	fn on_exit(&mut self, _old: &T) {}
}

/// Diffs `old` against `new` using a custom key and equality.
///
/// Enters and updates follow the order of `new`; exits come last, in no
/// particular order. Duplicate keys in `old` are an error.
pub fn diff_by<'a, T, K, E>(
	old: &'a [T],
	new: &'a [T],
	key: K,
	equals: E,
) -> CuResult<Vec<Change<'a, T>>>
where
	K: Fn(&T) -> String,
	E: Fn(&T, &T) -> bool,
{
	let mut old_by_key: HashMap<String, &'a T> = HashMap::with_capacity(old.len());
	for thing in old {
		let k = key(thing);
		if old_by_key.insert(k.clone(), thing).is_some() {
			return Err(Error::DuplicateKey(k));
		}
	}

	let mut changes = Vec::new();
	let mut seen = HashSet::with_capacity(new.len());
	for thing in new {
		let k = key(thing);
		match old_by_key.get(&k) {
			Some(&old_thing) => {
				if !equals(thing, old_thing) {
					changes.push(Change::Update { new: thing, old: old_thing });
				}
			}
			None => changes.push(Change::Enter(thing)),
		}
		seen.insert(k);
	}

	for (k, old_thing) in old_by_key {
		if !seen.contains(&k) {
			changes.push(Change::Exit(old_thing));
		}
	}
	Ok(changes)
}

/// Diffs by name using structural equality
pub fn diff<'a, T: Named + PartialEq>(old: &'a [T], new: &'a [T]) -> CuResult<Vec<Change<'a, T>>> {
	diff_by(old, new, |t| t.name().to_string(), |a, b| a == b)
}

/// Runs the reconciliation and dispatches every change to `handler`
pub fn updater<T, H>(old: &[T], new: &[T], handler: &mut H) -> CuResult<()>
where
	T: Named + PartialEq,
	H: UpdateHandler<T>,
{
	dispatch(diff(old, new)?, handler);
	Ok(())
}

pub fn updater_by<T, H, K, E>(old: &[T], new: &[T], key: K, equals: E, handler: &mut H) -> CuResult<()>
where
	H: UpdateHandler<T>,
	K: Fn(&T) -> String,
	E: Fn(&T, &T) -> bool,
{
	dispatch(diff_by(old, new, key, equals)?, handler);
	Ok(())
}

fn dispatch<T, H: UpdateHandler<T>>(changes: Vec<Change<'_, T>>, handler: &mut H) {
	for change in changes {
		match change {
			Change::Enter(new) => handler.on_enter(new),
			Change::Update { new, old } => handler.on_update(new, old),
			Change::Exit(old) => handler.on_exit(old),
		}
	}
}


// vim: ts=4
