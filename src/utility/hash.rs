//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::collections::{HashMap, HashSet};

/// A `HashMap` keyed with `ahash`. Almost every key in the optimizer is a
/// small integer entity or a function name, where `ahash` beats SipHash.
pub type SaHashMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// The `HashSet` counterpart of [`SaHashMap`].
pub type SaHashSet<V> = HashSet<V, ahash::RandomState>;
