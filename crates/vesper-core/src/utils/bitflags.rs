// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A declarative macro for strongly-typed flag sets.
//!
//! The RHI uses flag sets for everything that the native APIs express as OR-ed
//! integer masks: depth/stencil switches, attachment selections, color write
//! masks and the backend's resource states. Each invocation produces a `Copy`
//! newtype over the chosen integer with the usual set operations and a readable
//! `Debug` output (`DepthStencilFlags { DEPTH_TEST | DEPTH_WRITE }`).

/// Declares a flag-set newtype.
///
/// ```
/// vesper_core::vesper_bitflags! {
///     /// Channels touched by a write.
///     pub struct Channels: u8 {
///         const RED = 1;
///         const GREEN = 2;
///     }
/// }
/// let both = Channels::RED | Channels::GREEN;
/// assert!(both.contains(Channels::GREEN));
/// ```
#[macro_export]
macro_rules! vesper_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        #[allow(dead_code)]
        impl $name {
            /// The set with no flag raised.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Builds a set from raw bits. Unknown bits are preserved.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// The raw integer value.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// `true` when no bit is raised.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// `true` if every bit of `other` is raised in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// `true` if `self` and `other` share at least one bit.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Raises the bits of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the bits of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Raises or clears the bits of `other` depending on `value`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// Returns a copy with the bits of `other` raised.
            #[must_use]
            pub const fn with(mut self, other: Self) -> Self {
                self.bits |= other.bits;
                self
            }

            /// Returns a copy with the bits of `other` cleared.
            #[must_use]
            pub const fn without(mut self, other: Self) -> Self {
                self.bits &= !other.bits;
                self
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self { bits: self.bits | rhs.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self { bits: self.bits & rhs.bits }
            }
        }

        impl core::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self { bits: !self.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }

        impl core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, rhs: Self) {
                self.bits &= rhs.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut wrote_any = false;

                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    // Composite constants swallow their parts, so later aliases
                    // for already-printed bits are skipped.
                    let flag: $ty = $flag_value;
                    if flag != 0 && (remaining & flag) == flag {
                        if wrote_any {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        remaining &= !flag;
                        wrote_any = true;
                    }
                )*
                if remaining != 0 {
                    if wrote_any {
                        write!(f, " | ")?;
                    }
                    write!(f, "UNKNOWN({:#x})", remaining)?;
                    wrote_any = true;
                }
                if !wrote_any {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::vesper_bitflags! {
        /// Attachment selection used only by these tests.
        pub struct Planes: u16 {
            const COLOR = 1 << 0;
            const DEPTH = 1 << 1;
            const STENCIL = 1 << 2;
            const DEPTH_STENCIL = (1 << 1) | (1 << 2);
        }
    }

    #[test]
    fn empty_set_prints_and_contains_nothing() {
        let planes = Planes::default();
        assert!(planes.is_empty());
        assert!(planes.contains(Planes::EMPTY));
        assert!(!planes.intersects(Planes::COLOR));
        assert_eq!(format!("{planes:?}"), "Planes { EMPTY }");
    }

    #[test]
    fn composite_constant_is_printed_once() {
        let planes = Planes::DEPTH | Planes::STENCIL;
        assert_eq!(planes, Planes::DEPTH_STENCIL);
        assert_eq!(format!("{planes:?}"), "Planes { DEPTH | STENCIL }");
    }

    #[test]
    fn set_and_without_toggle_bits() {
        // --- 1. ARRANGE ---
        let mut planes = Planes::COLOR;

        // --- 2. ACT ---
        planes.set(Planes::DEPTH_STENCIL, true);
        let color_only = planes.without(Planes::DEPTH_STENCIL);
        planes.set(Planes::STENCIL, false);

        // --- 3. ASSERT ---
        assert_eq!(color_only, Planes::COLOR);
        assert!(planes.contains(Planes::COLOR | Planes::DEPTH));
        assert!(!planes.contains(Planes::STENCIL));
    }

    #[test]
    fn unknown_bits_survive_truncation() {
        let planes = Planes::from_bits_truncate(0b1001);
        assert_eq!(planes.bits(), 0b1001);
        assert_eq!(format!("{planes:?}"), "Planes { COLOR | UNKNOWN(0x8) }");
        assert_eq!((planes & Planes::COLOR), Planes::COLOR);
        assert_eq!((!Planes::COLOR).bits() & 1, 0);
    }
}
