use exert_types::ControlStrategy;

use super::{Exertion, ExertionCore};
use crate::{condition::Condition, context::Context, ids::SharedIds};

/// One step of a block.
#[derive(Debug)]
pub enum BlockItem {
    /// Always runs.
    Unit(Exertion),
    /// Runs when the condition holds at the time it is reached.
    Opt { condition: Condition, unit: Exertion },
    /// Runs the first arm whose condition holds.
    Alt(Vec<(Condition, Exertion)>),
    /// Runs while the condition holds, at most `max_iterations` times (engine default when unset).
    Loop {
        condition: Condition,
        max_iterations: Option<u32>,
        unit: Exertion,
    },
}

impl BlockItem {
    pub(crate) fn reset(&mut self) {
        match self {
            BlockItem::Unit(unit) | BlockItem::Opt { unit, .. } | BlockItem::Loop { unit, .. } => unit.reset(),
            BlockItem::Alt(arms) => arms.iter_mut().for_each(|(_, unit)| unit.reset()),
        }
    }

    /// Exertions reachable from this item, in declaration order.
    pub fn units(&self) -> Vec<&Exertion> {
        match self {
            BlockItem::Unit(unit) | BlockItem::Opt { unit, .. } | BlockItem::Loop { unit, .. } => vec![unit],
            BlockItem::Alt(arms) => arms.iter().map(|(_, unit)| unit).collect(),
        }
    }
}

/// Sequential composite whose items share the block's data context.
///
/// Before an item runs, paths of the block context it lacks are copied into it; afterwards
/// its context is appended back into the block context.
#[derive(Debug)]
pub struct Block {
    pub(crate) core: ExertionCore,
    pub(crate) items: Vec<BlockItem>,
}

impl Block {
    pub fn new(ids: &SharedIds, name: impl Into<String>) -> Self {
        Self {
            core: ExertionCore::new(ids, "block", name),
            items: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.core.set_context(context);
        self
    }

    pub fn with_strategy(mut self, strategy: ControlStrategy) -> Self {
        self.core.set_strategy(strategy);
        self
    }

    pub fn with_item(mut self, item: BlockItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_unit(self, unit: impl Into<Exertion>) -> Self {
        self.with_item(BlockItem::Unit(unit.into()))
    }

    pub fn with_opt(self, condition: Condition, unit: impl Into<Exertion>) -> Self {
        self.with_item(BlockItem::Opt {
            condition,
            unit: unit.into(),
        })
    }

    pub fn with_alt(self, arms: Vec<(Condition, Exertion)>) -> Self {
        self.with_item(BlockItem::Alt(arms))
    }

    pub fn with_loop(self, condition: Condition, max_iterations: Option<u32>, unit: impl Into<Exertion>) -> Self {
        self.with_item(BlockItem::Loop {
            condition,
            max_iterations,
            unit: unit.into(),
        })
    }

    pub fn core(&self) -> &ExertionCore {
        &self.core
    }

    pub fn context(&self) -> &Context {
        self.core.context()
    }

    pub fn items(&self) -> &[BlockItem] {
        &self.items
    }
}
