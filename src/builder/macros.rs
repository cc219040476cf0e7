//! Macros for ergonomic chart construction.

/// Declare several states on a [`ChartBuilder`](crate::builder::ChartBuilder)
/// and bind their handles to local variables.
///
/// A bare identifier is used as the state's name. Use `ident = "Name"` to
/// give the state a different display name.
///
/// # Example
///
/// ```
/// use hierarch::builder::ChartBuilder;
/// use hierarch::states;
///
/// let mut chart = ChartBuilder::new();
/// states!(chart => green, yellow, red = "Red");
///
/// chart.define(green, move |s| {
///     s.on("TIMER", yellow);
/// });
/// chart.define(yellow, move |s| {
///     s.on("TIMER", red);
/// });
/// chart.define(red, move |s| {
///     s.on("TIMER", green);
/// });
///
/// let chart = chart.build().unwrap();
/// assert_eq!(chart.name(green), Some("green"));
/// assert_eq!(chart.name(red), Some("Red"));
/// ```
#[macro_export]
macro_rules! states {
    ($builder:ident => ) => {};
    ($builder:ident => $name:ident = $label:expr $(, $($rest:tt)*)?) => {
        let $name = $builder.declare($label);
        $( $crate::states!($builder => $($rest)*); )?
    };
    ($builder:ident => $name:ident $(, $($rest:tt)*)?) => {
        let $name = $builder.declare(stringify!($name));
        $( $crate::states!($builder => $($rest)*); )?
    };
}
