//! The immutable technique catalog.

/// A named, fixed-power offensive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technique {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub power: u32,
    pub cooldown: u32,
}

/// Every technique known to the game, strongest first.
pub const TECHNIQUES: &[Technique] = &[
    Technique {
        id: "hollow-purple",
        name: "Hollow Purple",
        description: "Space deletion strike combining Blue and Red.",
        power: 38,
        cooldown: 6,
    },
    Technique {
        id: "domain-collapse",
        name: "Domain Collapse",
        description: "Short burst of domain energy that rattles opponents.",
        power: 34,
        cooldown: 5,
    },
    Technique {
        id: "black-flash",
        name: "Black Flash",
        description: "A temporal distortion attack that amplifies impact.",
        power: 33,
        cooldown: 4,
    },
    Technique {
        id: "cleave",
        name: "Cleave",
        description: "Precision slice that adapts to the opponent's toughness.",
        power: 31,
        cooldown: 3,
    },
    Technique {
        id: "dismantle",
        name: "Dismantle",
        description: "Rapid slashes that unravel protections.",
        power: 28,
        cooldown: 3,
    },
    Technique {
        id: "divergent-fist",
        name: "Divergent Fist",
        description: "Delayed cursed energy hit for double impact.",
        power: 26,
        cooldown: 2,
    },
];

/// Look up a technique by its identifier.
pub fn technique(id: &str) -> Option<&'static Technique> {
    TECHNIQUES.iter().find(|t| t.id == id)
}
