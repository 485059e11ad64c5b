//! Declarative mixer-control directives.

/// The value written to a control when its endpoint is enabled or disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    /// An integer (or boolean) control.
    Int {
        /// Value applied on enable.
        active: i32,
        /// Value restored on disable, or `None` to leave the control alone.
        inactive: Option<i32>,
    },
    /// A multiplexer selected by option name.
    Mux {
        /// Option selected on enable.
        active: &'static str,
        /// Option selected on disable, or `None` to leave the mux alone.
        inactive: Option<&'static str>,
    },
}

/// A single write issued against the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinWrite {
    /// Set an integer value.
    Value(i32),
    /// Select a mux option.
    Select(&'static str),
}

/// One mixer-control directive belonging to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    /// Control name as exposed by the mixer driver.
    pub control: &'static str,
    /// What to write on enable and disable.
    pub value: PinValue,
}

impl PinConfig {
    /// A switch set to `active` on enable and to its inverse on disable.
    #[must_use]
    pub const fn switch(control: &'static str, active: bool) -> Self {
        Self {
            control,
            value: PinValue::Int {
                active: active as i32,
                inactive: Some(!active as i32),
            },
        }
    }

    /// An integer control. A negative `inactive` leaves the control untouched on disable.
    #[must_use]
    pub const fn int(control: &'static str, active: i32, inactive: i32) -> Self {
        Self {
            control,
            value: PinValue::Int {
                active,
                inactive: if inactive < 0 { None } else { Some(inactive) },
            },
        }
    }

    /// A mux selecting `active` on enable and `inactive`, if any, on disable.
    #[must_use]
    pub const fn mux(
        control: &'static str,
        active: &'static str,
        inactive: Option<&'static str>,
    ) -> Self {
        Self {
            control,
            value: PinValue::Mux { active, inactive },
        }
    }

    /// Returns the write that applies this directive.
    #[must_use]
    pub fn on_enable(&self) -> PinWrite {
        match self.value {
            PinValue::Int { active, .. } => PinWrite::Value(active),
            PinValue::Mux { active, .. } => PinWrite::Select(active),
        }
    }

    /// Returns the write that reverts this directive, if reverting is meaningful.
    #[must_use]
    pub fn on_disable(&self) -> Option<PinWrite> {
        match self.value {
            PinValue::Int { inactive, .. } => inactive.map(PinWrite::Value),
            PinValue::Mux { inactive, .. } => inactive.map(PinWrite::Select),
        }
    }
}
