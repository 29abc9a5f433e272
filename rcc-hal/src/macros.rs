#![macro_use]

/// Declares peripheral clock gate markers and binds them to the families
/// that share the same enable/reset bit layout.
///
/// ```rust,ignore
/// clock_gates!([F1, F1Cl];
///     Usart1 => Field::bit(APB2ENR, 14), reset Field::bit(APB2RSTR, 14);
///     Dma1 => Field::bit(AHBENR, 0);
/// );
/// ```
macro_rules! clock_gates {
    (@impl [$($family:ty),*], $name:ident, $enable:expr, $reset:expr) => {
        $(
            impl crate::rcc::periph::SealedClockGate<$family> for $name {
                const ENABLE: crate::rcc::bus::Field = $enable;
                const RESET: Option<crate::rcc::bus::Field> = $reset;
            }
            impl crate::rcc::periph::ClockGate<$family> for $name {}
        )*
    };
    (@reset) => { None };
    (@reset $reset:expr) => { Some($reset) };
    ($families:tt; $($name:ident => $enable:expr $(, reset $reset:expr)?;)*) => {
        $(
            #[doc = concat!(stringify!($name), " peripheral clock")]
            #[derive(Clone, Copy, Debug)]
            pub struct $name;

            clock_gates!(@impl $families, $name, $enable, clock_gates!(@reset $($reset)?));
        )*
    };
}
