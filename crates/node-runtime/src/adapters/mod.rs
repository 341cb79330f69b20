pub mod in_proc_p2p;
