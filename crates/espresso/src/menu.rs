//! # Menu and Beverage Types
//!
//! The static data flowing through the shop: what a customer orders, the
//! intermediate products each stage hands to the next, and the finished
//! beverage.
//!
//! ```text
//! Order ─► GroundBeans ─► Espresso ─┐
//!   └────► Milk ────────► SteamedMilk ─► Beverage
//! ```

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoffeeBean {
    Regular,
    Premium,
    Decaf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Milk {
    Whole,
    Breve,
    NonFat,
}

/// Beans after they have been through the grinder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroundBeans(pub CoffeeBean);

/// A shot pulled from a porta-filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Espresso(pub GroundBeans);

/// Milk after it has been through a steam wand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SteamedMilk(pub Milk);

/// A menu item as ordered at the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    Cappuccino { beans: CoffeeBean, milk: Milk },
}

impl Order {
    pub const fn cappuccino(beans: CoffeeBean, milk: Milk) -> Self {
        Self::Cappuccino { beans, milk }
    }

    pub const fn beans(&self) -> CoffeeBean {
        match self {
            Self::Cappuccino { beans, .. } => *beans,
        }
    }

    pub const fn milk(&self) -> Milk {
        match self {
            Self::Cappuccino { milk, .. } => *milk,
        }
    }

    /// The six-order rush the shop is usually benchmarked with.
    pub fn default_batch() -> Vec<Self> {
        use CoffeeBean::{Decaf, Premium, Regular};
        use Milk::{Breve, NonFat, Whole};

        vec![
            Self::cappuccino(Regular, Whole),
            Self::cappuccino(Premium, Breve),
            Self::cappuccino(Regular, NonFat),
            Self::cappuccino(Decaf, Whole),
            Self::cappuccino(Regular, NonFat),
            Self::cappuccino(Decaf, NonFat),
        ]
    }

    /// Returns `count` orders by cycling through [`Order::default_batch`].
    pub fn batch(count: usize) -> Vec<Self> {
        Self::default_batch().into_iter().cycle().take(count).collect()
    }
}

/// A finished drink, carrying the order it was made for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Beverage {
    Cappuccino {
        order: Order,
        espresso: Espresso,
        steamed_milk: SteamedMilk,
    },
}

impl Beverage {
    pub const fn order(&self) -> Order {
        match self {
            Self::Cappuccino { order, .. } => *order,
        }
    }
}

impl fmt::Display for CoffeeBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::Premium => write!(f, "premium"),
            Self::Decaf => write!(f, "decaf"),
        }
    }
}

impl fmt::Display for Milk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => write!(f, "whole"),
            Self::Breve => write!(f, "breve"),
            Self::NonFat => write!(f, "non-fat"),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cappuccino { beans, milk } => {
                write!(f, "cappuccino ({beans} beans, {milk} milk)")
            }
        }
    }
}

impl fmt::Display for Beverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cappuccino {
                espresso: Espresso(GroundBeans(beans)),
                steamed_milk: SteamedMilk(milk),
                ..
            } => write!(f, "cappuccino [espresso: {beans}, steamed milk: {milk}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_cycles_the_default_rush() {
        let defaults = Order::default_batch();
        let orders = Order::batch(14);

        assert_eq!(orders.len(), 14);
        assert_eq!(&orders[..6], &defaults[..]);
        assert_eq!(&orders[6..12], &defaults[..]);
        assert_eq!(orders[12], defaults[0]);
    }

    #[test]
    fn beverage_remembers_its_order() {
        let order = Order::cappuccino(CoffeeBean::Premium, Milk::Breve);
        let beverage = Beverage::Cappuccino {
            order,
            espresso: Espresso(GroundBeans(order.beans())),
            steamed_milk: SteamedMilk(order.milk()),
        };

        assert_eq!(beverage.order(), order);
        assert_eq!(
            beverage.to_string(),
            "cappuccino [espresso: premium, steamed milk: breve]"
        );
    }
}
