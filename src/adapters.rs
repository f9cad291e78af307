pub mod pcsc;
