// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub const TEXT: &str = "\
attach                                    attach to the target
detach                                    detach from the target
clear                                     empty the candidate set
lookup <type> <value>                     (l) scan all regions for <value>
filter <type> <value>                     (f) keep candidates matching <value>
pair_filter <type> <value> <count>        lookup <value>, keep <count> nearest to prior candidates
change <type> <value>                     (c) write <value> to every candidate
replace <hexaddr> <type> <value>          write <value> at a single address
freeze <hexaddr> <type> <value>           pin an address to <value>
freeze_terminate                          stop every freeze worker
diff [start|upper|lower|same|change|end]  snapshot/compare regions
scope [substr]                            restrict regions to pathnames containing <substr>
result                                    print the current candidate set
dump <hexaddr> <hexlen>                   hex+ascii dump of a range
dumpall [path]                            dump pid, regions, and all region bytes to <path>
save [path]                               save region/candidate state to <path>
load [path]                               load region/candidate state from <path>
help                                      this text
exit | quit                               detach, stop freeze workers, and exit

types: ascii utf16 utf32 hex int int_big long long_big float float_big double double_big float_fuzzy
lines beginning with # or / are comments
";
