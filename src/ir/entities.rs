//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use static_assertions::assert_eq_size;
use std::fmt;

macro_rules! ir_entity {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident => $prefix:literal; $($rest:tt)* ) => {
        $(#[$outer])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(u32);

        impl $name {
            /// Creates a reference from a raw index. Panics if the index
            /// does not fit in the underlying storage type.
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(u32::try_from(index).expect("index is not representable with entity type"))
            }

            /// Gets the raw index that the reference wraps.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        ir_entity!($($rest)*);
    };

    () => {}
}

ir_entity! {
    /// An SSA value. Values are either function parameters or the result
    /// of exactly one instruction.
    pub struct Value => "%";

    /// A memory location produced by `alloc_box` or `alloc_stack`.
    ///
    /// Slots are not values, they can only be accessed through the memory
    /// instructions (`load`, `store`, `capture`).
    pub struct Slot => "$";
}

assert_eq_size!(Value, u32);
assert_eq_size!(Slot, u32);
